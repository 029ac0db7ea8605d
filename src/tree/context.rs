use super::{ErrorNode, TreeNode};
use crate::account::{AccountProvider, Subscription};
use crate::error::{ExplorerError, Result};
use crate::management::{ManagementClient, RegistryCredentialSet, RegistryDescriptor};
use crate::registry::RegistryClient;
use crate::settings::ExplorerSettings;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

/// Collaborators shared by every node of one explorer tree
pub struct ExplorerServices {
    pub account: Arc<dyn AccountProvider>,
    pub management: Arc<dyn ManagementClient>,
    pub registry: RegistryClient,
    pub settings: ExplorerSettings,
}

impl fmt::Debug for ExplorerServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorerServices")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ExplorerServices {
    /// Turn a failed expansion into its outcome for the host
    ///
    /// Recoverable failures become an empty child list, or a single error
    /// node when `show_error_nodes` is set. Anything else propagates.
    pub(crate) fn degrade(&self, node: &str, err: ExplorerError) -> Result<Vec<TreeNode>> {
        if !err.is_recoverable() {
            error!(node = %node, error = %err, "Expansion failed");
            return Err(err);
        }

        warn!(node = %node, error = %err, "Expansion degraded to no children");
        if self.settings.show_error_nodes {
            Ok(vec![TreeNode::Error(ErrorNode::new(err.to_string()))])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Registry-level state handed down from a registry node to its descendants
pub struct RegistryContext {
    pub services: Arc<ExplorerServices>,
    pub subscription: Subscription,
    pub registry: RegistryDescriptor,
    pub credentials: RegistryCredentialSet,
}

impl RegistryContext {
    /// Login server; doubles as the data-plane host
    pub fn login_server(&self) -> &str {
        &self.registry.login_server
    }
}

impl fmt::Debug for RegistryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryContext")
            .field("subscription", &self.subscription.subscription_id)
            .field("registry", &self.registry.login_server)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RegistryContext {
    fn eq(&self, other: &Self) -> bool {
        self.subscription == other.subscription
            && self.registry == other.registry
            && self.credentials == other.credentials
    }
}
