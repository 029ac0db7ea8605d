//! Management-plane collaborator: registry listing and admin credentials.

pub mod arm;

pub use arm::ArmClient;

use crate::account::Session;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrySku {
    pub name: String,
    pub tier: String,
}

/// Container registry as reported by the management plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDescriptor {
    pub id: String,
    pub name: String,
    pub location: String,
    pub login_server: String,
    pub sku: RegistrySku,
    pub admin_user_enabled: bool,
}

impl RegistryDescriptor {
    /// Only managed registries with the admin user enabled are shown
    pub fn is_explorable(&self) -> bool {
        self.admin_user_enabled && self.sku.tier.contains("Managed")
    }

    /// Resource group segment of the registry's resource id
    pub fn resource_group(&self) -> Option<&str> {
        const MARKER: &str = "resourceGroups/";
        let start = self.id.find(MARKER)? + MARKER.len();
        let rest = &self.id[start..];
        let end = rest.find("/providers/")?;
        Some(&rest[..end])
    }
}

/// Admin basic-auth credential of a registry
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentialSet {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentialSet")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Raw `listCredentials` result
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryCredentialsResult {
    pub username: String,
    #[serde(default)]
    pub passwords: Vec<RegistryPassword>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryPassword {
    #[serde(default)]
    pub name: Option<String>,
    pub value: String,
}

impl RegistryCredentialsResult {
    /// Username plus the primary password, if any password is present
    pub fn primary(&self) -> Option<RegistryCredentialSet> {
        self.passwords.first().map(|p| RegistryCredentialSet {
            username: self.username.clone(),
            password: p.value.clone(),
        })
    }
}

#[async_trait]
pub trait ManagementClient: Send + Sync {
    async fn list_registries(
        &self,
        session: &Session,
        subscription_id: &str,
    ) -> Result<Vec<RegistryDescriptor>>;

    async fn list_credentials(
        &self,
        session: &Session,
        subscription_id: &str,
        resource_group: &str,
        registry_name: &str,
    ) -> Result<RegistryCredentialsResult>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    pub fn descriptor(name: &str, tier: &str, admin_user_enabled: bool) -> RegistryDescriptor {
        RegistryDescriptor {
            id: format!(
                "/subscriptions/sub-1/resourceGroups/rg-{}/providers/Microsoft.ContainerRegistry/registries/{}",
                name, name
            ),
            name: name.to_string(),
            location: "westus".to_string(),
            login_server: format!("{}.azurecr.io", name),
            sku: RegistrySku {
                name: tier.to_string(),
                tier: tier.to_string(),
            },
            admin_user_enabled,
        }
    }

    /// In-memory management plane keyed by subscription id
    #[derive(Default)]
    pub struct FakeManagement {
        pub registries: HashMap<String, Vec<RegistryDescriptor>>,
        pub credentials: HashMap<String, RegistryCredentialsResult>,
        pub fail_listing: bool,
        pub failing_subscriptions: Vec<String>,
    }

    impl FakeManagement {
        pub fn with_registry(
            mut self,
            subscription_id: &str,
            registry: RegistryDescriptor,
            username: &str,
            password: &str,
        ) -> Self {
            self.credentials.insert(
                registry.name.clone(),
                RegistryCredentialsResult {
                    username: username.to_string(),
                    passwords: vec![RegistryPassword {
                        name: Some("password".to_string()),
                        value: password.to_string(),
                    }],
                },
            );
            self.registries
                .entry(subscription_id.to_string())
                .or_default()
                .push(registry);
            self
        }
    }

    #[async_trait]
    impl ManagementClient for FakeManagement {
        async fn list_registries(
            &self,
            _session: &Session,
            subscription_id: &str,
        ) -> Result<Vec<RegistryDescriptor>> {
            let failing = self
                .failing_subscriptions
                .iter()
                .any(|s| s == subscription_id);
            if self.fail_listing || failing {
                anyhow::bail!("management endpoint unavailable");
            }
            Ok(self
                .registries
                .get(subscription_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_credentials(
            &self,
            _session: &Session,
            _subscription_id: &str,
            _resource_group: &str,
            registry_name: &str,
        ) -> Result<RegistryCredentialsResult> {
            self.credentials
                .get(registry_name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("registry {} not found", registry_name))
        }
    }
}
