use super::{humanize_since, RegistryContext, TreeItem, TreeNode};
use crate::account::find_session;
use crate::error::Result;
use crate::management::RegistryCredentialSet;
use crate::registry::{BearerTokenPair, Scope};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// A repository inside a registry
#[derive(Debug, Clone)]
pub struct RepositoryNode {
    context: Arc<RegistryContext>,
    name: String,
    tokens: BearerTokenPair,
}

impl RepositoryNode {
    pub fn new(context: Arc<RegistryContext>, name: String, tokens: BearerTokenPair) -> Self {
        Self {
            context,
            name,
            tokens,
        }
    }

    pub fn label(&self) -> &str {
        &self.name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_url(&self) -> &str {
        self.context.login_server()
    }

    pub fn credentials(&self) -> &RegistryCredentialSet {
        &self.context.credentials
    }

    /// Catalog-scoped tokens the parent registry listed this repository with
    pub fn tokens(&self) -> &BearerTokenPair {
        &self.tokens
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem::collapsed(&self.name, "azureRepositoryNode")
    }

    pub async fn get_children(&self) -> Result<Vec<TreeNode>> {
        match self.list_images().await {
            Ok(children) => Ok(children),
            Err(err) => self.context.services.degrade(&self.name, err),
        }
    }

    async fn list_images(&self) -> Result<Vec<TreeNode>> {
        let services = &self.context.services;
        let sessions = services.account.sessions();
        let session = find_session(&sessions, &self.context.subscription.tenant_id)?;
        let host = self.server_url();
        let scope = Scope::RepositoryPull(self.name.clone());

        let Some(tokens) = services.registry.acquire_tokens(session, host, &scope).await? else {
            info!(registry = %host, repository = %self.name, "No pull token issued, nothing to list");
            return Ok(Vec::new());
        };

        let tags = services
            .registry
            .tags(host, &self.name, &tokens.access_token)
            .await?;
        if tags.is_empty() {
            debug!(registry = %host, repository = %self.name, "Repository has no tags");
            return Ok(Vec::new());
        }

        // `buffered` keeps results in tag order while bounding requests in flight
        let lookups: Vec<_> = tags
            .iter()
            .map(|tag| {
                services
                    .registry
                    .image_created(host, &self.name, tag, &tokens.access_token)
            })
            .collect();
        let created: Vec<Option<DateTime<Utc>>> = stream::iter(lookups)
            .buffered(services.registry.manifest_concurrency())
            .try_collect()
            .await?;

        info!(
            registry = %host,
            repository = %self.name,
            count = tags.len(),
            "Listed images"
        );

        let now = Utc::now();
        Ok(tags
            .into_iter()
            .zip(created)
            .map(|(tag, created)| {
                TreeNode::Image(ImageNode::new(
                    self.context.clone(),
                    self.name.clone(),
                    tag,
                    created,
                    now,
                ))
            })
            .collect())
    }
}

impl PartialEq for RepositoryNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tokens == other.tokens && self.context == other.context
    }
}

/// A tagged image; always a leaf
#[derive(Debug, Clone)]
pub struct ImageNode {
    context: Arc<RegistryContext>,
    repository: String,
    tag: String,
    created: Option<DateTime<Utc>>,
    label: String,
}

impl ImageNode {
    /// The label freezes the relative age as of `now`
    pub fn new(
        context: Arc<RegistryContext>,
        repository: String,
        tag: String,
        created: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let label = match created {
            Some(created) => format!("{}:{} ({})", repository, tag, humanize_since(created, now)),
            None => format!("{}:{}", repository, tag),
        };
        Self {
            context,
            repository,
            tag,
            created,
            label,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn server_url(&self) -> &str {
        self.context.login_server()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn credentials(&self) -> &RegistryCredentialSet {
        &self.context.credentials
    }

    /// Fully qualified reference, e.g. `myreg.azurecr.io/app:v1`
    pub fn image_reference(&self) -> String {
        format!("{}/{}:{}", self.server_url(), self.repository, self.tag)
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem {
            context_value: Some("azureImageNode"),
            ..TreeItem::leaf(&self.label)
        }
    }
}

impl PartialEq for ImageNode {
    fn eq(&self, other: &Self) -> bool {
        self.repository == other.repository
            && self.tag == other.tag
            && self.created == other.created
            && self.context == other.context
    }
}
