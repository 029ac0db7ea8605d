use super::{
    ChangeNotifier, ExplorerServices, LoadingNode, NotSignedInNode, RegistryContext, RegistryNode,
    TreeChange, TreeItem, TreeNode,
};
use crate::account::{find_session, AccountStatus, Session, Subscription};
use crate::error::{ExplorerError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Top of the explorer tree; lists the explorable registries of every
/// filtered subscription.
#[derive(Debug)]
pub struct RootNode {
    label: String,
    services: Arc<ExplorerServices>,
    notifier: ChangeNotifier,
}

impl RootNode {
    /// Create the root and start forwarding account changes to subscribers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(services: Arc<ExplorerServices>) -> Arc<Self> {
        let notifier = ChangeNotifier::spawn(services.account.subscribe());
        Arc::new(Self {
            label: services.settings.root_label.clone(),
            services,
            notifier,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn services(&self) -> &Arc<ExplorerServices> {
        &self.services
    }

    /// Changes after which the host should query the root's children again
    pub fn subscribe(&self) -> broadcast::Receiver<TreeChange> {
        self.notifier.subscribe()
    }

    /// Ask the host to re-query; nothing is recomputed here
    pub fn refresh(&self) {
        let reached = self.notifier.notify(TreeChange::Refreshed);
        debug!(subscribers = reached, "Tree refresh requested");
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem::collapsed(&self.label, "azureRegistryRootNode")
    }

    pub async fn get_children(&self) -> Result<Vec<TreeNode>> {
        let account = &self.services.account;
        let logged_in = account.wait_for_login().await;

        match account.status() {
            AccountStatus::Initializing | AccountStatus::LoggingIn => {
                return Ok(vec![TreeNode::Loading(LoadingNode)]);
            }
            AccountStatus::LoggedOut => {
                return Ok(vec![TreeNode::NotSignedIn(NotSignedInNode::new(
                    account.clone(),
                ))]);
            }
            AccountStatus::LoggedIn => {}
        }

        if !logged_in {
            return Ok(Vec::new());
        }

        match self.list_registries().await {
            Ok(children) => Ok(children),
            Err(err) => self.services.degrade(&self.label, err),
        }
    }

    async fn list_registries(&self) -> Result<Vec<TreeNode>> {
        let sessions = self.services.account.sessions();
        let subscriptions = self.services.account.filtered_subscriptions();

        // A failing subscription degrades on its own; fatal errors still abort
        let sessions = &sessions;
        let lookups: Vec<_> = subscriptions
            .iter()
            .map(|subscription| async move {
                match self.list_subscription(sessions, subscription).await {
                    Ok(nodes) => Ok(nodes),
                    Err(err) => self.services.degrade(&subscription.display_name, err),
                }
            })
            .collect();
        let per_subscription: Vec<Vec<TreeNode>> = stream::iter(lookups)
            .buffered(self.services.settings.subscription_concurrency.max(1))
            .try_collect()
            .await?;

        let children: Vec<TreeNode> = per_subscription.into_iter().flatten().collect();
        info!(
            subscriptions = subscriptions.len(),
            registries = children.len(),
            "Listed registries"
        );
        Ok(children)
    }

    async fn list_subscription(
        &self,
        sessions: &[Session],
        subscription: &Subscription,
    ) -> Result<Vec<TreeNode>> {
        let session = find_session(sessions, &subscription.tenant_id)?;
        let management = &self.services.management;

        let registries = management
            .list_registries(session, &subscription.subscription_id)
            .await
            .map_err(ExplorerError::from_management)?;

        let mut nodes = Vec::new();
        for registry in registries {
            if !registry.is_explorable() {
                debug!(
                    registry = %registry.name,
                    tier = %registry.sku.tier,
                    admin_user_enabled = registry.admin_user_enabled,
                    "Skipping registry"
                );
                continue;
            }

            let Some(resource_group) = registry.resource_group() else {
                warn!(registry = %registry.name, id = %registry.id, "Registry id has no resource group, skipping");
                continue;
            };

            let listed = management
                .list_credentials(
                    session,
                    &subscription.subscription_id,
                    resource_group,
                    &registry.name,
                )
                .await
                .map_err(ExplorerError::from_management)?;

            let Some(credentials) = listed.primary() else {
                warn!(registry = %registry.name, "Registry has no admin password, skipping");
                continue;
            };

            nodes.push(TreeNode::Registry(RegistryNode::new(Arc::new(
                RegistryContext {
                    services: self.services.clone(),
                    subscription: subscription.clone(),
                    registry,
                    credentials,
                },
            ))));
        }

        Ok(nodes)
    }
}
