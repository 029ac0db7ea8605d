use super::{NodeCommand, TreeItem};
use crate::account::AccountProvider;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

const NOT_SIGNED_IN_LABEL: &str = "Sign in to Azure...";
const LOADING_LABEL: &str = "Loading...";
const LOGIN_COMMAND: &str = "azure-account.login";

/// Shown under the root while the account is signed out
#[derive(Clone)]
pub struct NotSignedInNode {
    account: Arc<dyn AccountProvider>,
}

impl NotSignedInNode {
    pub fn new(account: Arc<dyn AccountProvider>) -> Self {
        Self { account }
    }

    pub fn label(&self) -> &str {
        NOT_SIGNED_IN_LABEL
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem {
            command: Some(NodeCommand {
                title: NOT_SIGNED_IN_LABEL.to_string(),
                command: LOGIN_COMMAND,
            }),
            ..TreeItem::leaf(NOT_SIGNED_IN_LABEL)
        }
    }

    /// Start the account's sign-in flow
    pub async fn sign_in(&self) -> Result<()> {
        self.account.login().await
    }
}

impl fmt::Debug for NotSignedInNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotSignedInNode").finish_non_exhaustive()
    }
}

/// Shown under the root while the account is initialising or signing in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingNode;

impl LoadingNode {
    pub fn label(&self) -> &str {
        LOADING_LABEL
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem::leaf(LOADING_LABEL)
    }
}

/// Stands in for the children of an expansion that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    message: String,
}

impl ErrorNode {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.message
    }

    pub fn render_as_tree_item(&self) -> TreeItem {
        TreeItem {
            context_value: Some("azureErrorNode"),
            ..TreeItem::leaf(&self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::StaticAccount;
    use crate::tree::Collapsibility;

    #[test]
    fn test_status_items_are_leaves() {
        let item = LoadingNode.render_as_tree_item();
        assert_eq!(item.label, "Loading...");
        assert_eq!(item.collapsible, Collapsibility::None);
        assert!(item.command.is_none());

        let item = ErrorNode::new("registry unreachable").render_as_tree_item();
        assert_eq!(item.label, "registry unreachable");
        assert_eq!(item.collapsible, Collapsibility::None);
    }

    #[tokio::test]
    async fn test_not_signed_in_triggers_login() {
        let node = NotSignedInNode::new(Arc::new(StaticAccount::new(Vec::new(), Vec::new())));
        let item = node.render_as_tree_item();
        assert_eq!(item.label, "Sign in to Azure...");
        assert_eq!(item.command.unwrap().command, "azure-account.login");

        // The settings-backed account cannot sign in interactively
        assert!(node.sign_in().await.is_err());
    }
}
