//! Fixtures shared by the tree tests.

use super::{ExplorerServices, RegistryContext};
use crate::account::testing::{session, FixedCredential};
use crate::account::{StaticAccount, Subscription};
use crate::management::testing::{descriptor, FakeManagement};
use crate::management::{ManagementClient, RegistryCredentialSet};
use crate::registry::testing::client_for_mock;
use crate::settings::{ExplorerSettings, ManifestReference};
use std::sync::Arc;

pub const TENANT_ID: &str = "tenant-a";
pub const SUBSCRIPTION_ID: &str = "sub-1";

/// One signed-in tenant with a single filtered subscription
pub struct Fixture {
    pub account: Arc<StaticAccount>,
    pub management: Arc<dyn ManagementClient>,
    pub show_error_nodes: bool,
    pub manifest_reference: ManifestReference,
}

impl Fixture {
    pub fn signed_in() -> Self {
        Self::with_credential(FixedCredential::new("aad-access", "aad-refresh"))
    }

    pub fn with_failing_directory() -> Self {
        Self::with_credential(FixedCredential::failing())
    }

    fn with_credential(credential: FixedCredential) -> Self {
        let account = StaticAccount::new(
            vec![session(TENANT_ID, Arc::new(credential))],
            vec![Subscription::new(SUBSCRIPTION_ID, "Dev", TENANT_ID)],
        );
        Self {
            account: Arc::new(account),
            management: Arc::new(FakeManagement::default()),
            show_error_nodes: false,
            manifest_reference: ManifestReference::Latest,
        }
    }

    pub fn with_management(mut self, management: FakeManagement) -> Self {
        self.management = Arc::new(management);
        self
    }
}

pub fn services_for(fixture: &Fixture) -> Arc<ExplorerServices> {
    Arc::new(ExplorerServices {
        account: fixture.account.clone(),
        management: fixture.management.clone(),
        registry: client_for_mock(fixture.manifest_reference),
        settings: ExplorerSettings {
            show_error_nodes: fixture.show_error_nodes,
            ..ExplorerSettings::default()
        },
    })
}

/// Context of a managed registry whose login server is `host`, admin `u`/`p`
pub fn registry_context(services: Arc<ExplorerServices>, host: &str) -> Arc<RegistryContext> {
    let mut registry = descriptor("myreg", "Managed_Basic", true);
    registry.login_server = host.to_string();
    Arc::new(RegistryContext {
        services,
        subscription: Subscription::new(SUBSCRIPTION_ID, "Dev", TENANT_ID),
        registry,
        credentials: RegistryCredentialSet {
            username: "u".to_string(),
            password: "p".to_string(),
        },
    })
}
