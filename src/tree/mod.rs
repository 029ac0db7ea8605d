//! Lazy explorer tree: root → registry → repository → image.
//!
//! Nodes never cache their children. Every call to [`TreeNode::get_children`]
//! asks the account, management plane and registry again, and builds fresh
//! child nodes that share an immutable [`RegistryContext`] below the root.

mod context;
mod events;
mod expander;
mod registry;
mod repository;
mod root;
mod status;
mod time;

pub use context::{ExplorerServices, RegistryContext};
pub use events::{ChangeNotifier, TreeChange};
pub use expander::Expander;
pub use registry::RegistryNode;
pub use repository::{ImageNode, RepositoryNode};
pub use root::RootNode;
pub use status::{ErrorNode, LoadingNode, NotSignedInNode};
pub use time::humanize_since;

use crate::error::Result;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapsibility {
    None,
    Collapsed,
}

/// Host command attached to a tree item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCommand {
    pub title: String,
    pub command: &'static str,
}

/// What the host renders for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub label: String,
    pub collapsible: Collapsibility,
    pub context_value: Option<&'static str>,
    pub command: Option<NodeCommand>,
}

impl TreeItem {
    fn leaf(label: &str) -> Self {
        Self {
            label: label.to_string(),
            collapsible: Collapsibility::None,
            context_value: None,
            command: None,
        }
    }

    fn collapsed(label: &str, context_value: &'static str) -> Self {
        Self {
            label: label.to_string(),
            collapsible: Collapsibility::Collapsed,
            context_value: Some(context_value),
            command: None,
        }
    }
}

/// Every node the explorer can produce
#[derive(Debug, Clone)]
pub enum TreeNode {
    Root(Arc<RootNode>),
    Registry(RegistryNode),
    Repository(RepositoryNode),
    Image(ImageNode),
    NotSignedIn(NotSignedInNode),
    Loading(LoadingNode),
    Error(ErrorNode),
}

impl TreeNode {
    pub fn label(&self) -> &str {
        match self {
            TreeNode::Root(node) => node.label(),
            TreeNode::Registry(node) => node.label(),
            TreeNode::Repository(node) => node.label(),
            TreeNode::Image(node) => node.label(),
            TreeNode::NotSignedIn(node) => node.label(),
            TreeNode::Loading(node) => node.label(),
            TreeNode::Error(node) => node.label(),
        }
    }

    /// Stable key used to match repeated expansions of the same node
    pub fn id(&self) -> String {
        match self {
            TreeNode::Root(node) => format!("root:{}", node.label()),
            TreeNode::Registry(node) => format!(
                "registry:{}/{}",
                node.context().subscription.subscription_id,
                node.login_server()
            ),
            TreeNode::Repository(node) => {
                format!("repository:{}/{}", node.server_url(), node.name())
            }
            TreeNode::Image(node) => format!(
                "image:{}/{}:{}",
                node.server_url(),
                node.repository(),
                node.tag()
            ),
            TreeNode::NotSignedIn(_) => "status:not-signed-in".to_string(),
            TreeNode::Loading(_) => "status:loading".to_string(),
            TreeNode::Error(node) => format!("status:error:{}", node.label()),
        }
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        match self {
            TreeNode::Root(node) => node.render_as_tree_item(),
            TreeNode::Registry(node) => node.render_as_tree_item(),
            TreeNode::Repository(node) => node.render_as_tree_item(),
            TreeNode::Image(node) => node.render_as_tree_item(),
            TreeNode::NotSignedIn(node) => node.render_as_tree_item(),
            TreeNode::Loading(node) => node.render_as_tree_item(),
            TreeNode::Error(node) => node.render_as_tree_item(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.render_as_tree_item().collapsible == Collapsibility::None
    }

    /// Compute this node's children afresh
    pub async fn get_children(&self) -> Result<Vec<TreeNode>> {
        match self {
            TreeNode::Root(node) => node.get_children().await,
            TreeNode::Registry(node) => node.get_children().await,
            TreeNode::Repository(node) => node.get_children().await,
            TreeNode::Image(_)
            | TreeNode::NotSignedIn(_)
            | TreeNode::Loading(_)
            | TreeNode::Error(_) => Ok(Vec::new()),
        }
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TreeNode::Root(a), TreeNode::Root(b)) => Arc::ptr_eq(a, b),
            (TreeNode::Registry(a), TreeNode::Registry(b)) => a == b,
            (TreeNode::Repository(a), TreeNode::Repository(b)) => a == b,
            (TreeNode::Image(a), TreeNode::Image(b)) => a == b,
            (TreeNode::NotSignedIn(_), TreeNode::NotSignedIn(_)) => true,
            (TreeNode::Loading(_), TreeNode::Loading(_)) => true,
            (TreeNode::Error(a), TreeNode::Error(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
