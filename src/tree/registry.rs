use super::{RegistryContext, RepositoryNode, TreeItem, TreeNode};
use crate::account::find_session;
use crate::error::Result;
use crate::management::RegistryCredentialSet;
use crate::registry::Scope;
use std::sync::Arc;
use tracing::info;

/// A registry login server under the root
#[derive(Debug, Clone)]
pub struct RegistryNode {
    context: Arc<RegistryContext>,
}

impl RegistryNode {
    pub fn new(context: Arc<RegistryContext>) -> Self {
        Self { context }
    }

    pub fn label(&self) -> &str {
        self.context.login_server()
    }

    pub fn login_server(&self) -> &str {
        self.context.login_server()
    }

    pub fn context(&self) -> &Arc<RegistryContext> {
        &self.context
    }

    pub fn credentials(&self) -> &RegistryCredentialSet {
        &self.context.credentials
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem::collapsed(self.label(), "azureRegistryNode")
    }

    pub async fn get_children(&self) -> Result<Vec<TreeNode>> {
        match self.list_repositories().await {
            Ok(children) => Ok(children),
            Err(err) => self.context.services.degrade(self.label(), err),
        }
    }

    async fn list_repositories(&self) -> Result<Vec<TreeNode>> {
        let services = &self.context.services;
        let sessions = services.account.sessions();
        let session = find_session(&sessions, &self.context.subscription.tenant_id)?;
        let host = self.login_server();

        let tokens = match services
            .registry
            .acquire_tokens(session, host, &Scope::Catalog)
            .await?
        {
            Some(tokens) => tokens,
            None => {
                info!(registry = %host, "No registry token issued, nothing to list");
                return Ok(Vec::new());
            }
        };

        let repositories = services.registry.catalog(host, &tokens.access_token).await?;
        info!(
            registry = %host,
            count = repositories.len(),
            "Listed repositories"
        );

        Ok(repositories
            .into_iter()
            .map(|name| {
                TreeNode::Repository(RepositoryNode::new(
                    self.context.clone(),
                    name,
                    tokens.clone(),
                ))
            })
            .collect())
    }
}

impl PartialEq for RegistryNode {
    fn eq(&self, other: &Self) -> bool {
        self.context == other.context
    }
}
