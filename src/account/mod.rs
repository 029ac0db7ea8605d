//! Account collaborator: signed-in directory sessions and the subscriptions
//! the user has selected.
//!
//! The explorer only reads from the account. Login flows, subscription
//! filtering and token storage belong to the implementation behind
//! [`AccountProvider`].

pub mod aad;
pub mod static_account;

pub use aad::RefreshTokenCredential;
pub use static_account::StaticAccount;

use crate::error::{ExplorerError, Result};
use crate::settings::AzureEnvironment;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Token pair issued by the directory for a session
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryToken {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for DirectoryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Opaque credential handle of a session
#[async_trait]
pub trait DirectoryCredential: Send + Sync {
    /// Acquire an access/refresh token pair for `resource`
    async fn acquire_token(&self, resource: &str) -> AnyResult<DirectoryToken>;
}

/// An authenticated directory (tenant) session
#[derive(Clone)]
pub struct Session {
    pub tenant_id: String,
    pub user_name: Option<String>,
    pub environment: AzureEnvironment,
    pub credential: Arc<dyn DirectoryCredential>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tenant_id", &self.tenant_id)
            .field("user_name", &self.user_name)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Acquire the directory token used to enter the registry token exchange
    pub async fn directory_token(&self) -> Result<DirectoryToken> {
        self.credential
            .acquire_token(&self.environment.directory_resource_id)
            .await
            .map_err(|e| ExplorerError::DirectoryToken {
                tenant: self.tenant_id.clone(),
                message: format!("{:#}", e),
            })
    }
}

/// Snapshot of a subscription selected in the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub subscription_id: String,
    pub display_name: String,
    pub tenant_id: String,
    pub state: String,
}

impl Subscription {
    pub fn new(subscription_id: &str, display_name: &str, tenant_id: &str) -> Self {
        Self {
            id: format!("/subscriptions/{}", subscription_id),
            subscription_id: subscription_id.to_string(),
            display_name: display_name.to_string(),
            tenant_id: tenant_id.to_string(),
            state: "Enabled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Initializing,
    LoggingIn,
    LoggedOut,
    LoggedIn,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Initializing => write!(f, "Initializing"),
            AccountStatus::LoggingIn => write!(f, "LoggingIn"),
            AccountStatus::LoggedOut => write!(f, "LoggedOut"),
            AccountStatus::LoggedIn => write!(f, "LoggedIn"),
        }
    }
}

/// Account-level change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEvent {
    FiltersChanged,
    StatusChanged,
    SessionsChanged,
}

#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Wait until the account finished initialising; true when signed in
    async fn wait_for_login(&self) -> bool;

    fn status(&self) -> AccountStatus;

    fn sessions(&self) -> Vec<Session>;

    fn filtered_subscriptions(&self) -> Vec<Subscription>;

    /// Stream of filter, status and session changes
    fn subscribe(&self) -> broadcast::Receiver<AccountEvent>;

    /// Start the interactive sign-in flow
    async fn login(&self) -> AnyResult<()>;
}

/// Find the session for `tenant_id`, ignoring case
pub fn find_session<'a>(sessions: &'a [Session], tenant_id: &str) -> Result<&'a Session> {
    let wanted = tenant_id.to_lowercase();
    sessions
        .iter()
        .find(|s| s.tenant_id.to_lowercase() == wanted)
        .ok_or_else(|| ExplorerError::SessionNotFound(tenant_id.to_string()))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn sessions() -> Vec<Session> {
        vec![
            session("AAAA-1111", Arc::new(FixedCredential::new("a1", "r1"))),
            session("bbbb-2222", Arc::new(FixedCredential::new("a2", "r2"))),
        ]
    }

    #[test]
    fn test_find_session_ignores_case() {
        let sessions = sessions();
        let found = find_session(&sessions, "aaaa-1111").unwrap();
        assert_eq!(found.tenant_id, "AAAA-1111");
        let found = find_session(&sessions, "BBBB-2222").unwrap();
        assert_eq!(found.tenant_id, "bbbb-2222");
    }

    #[test]
    fn test_find_session_missing_tenant_is_an_error() {
        let sessions = sessions();
        let err = find_session(&sessions, "cccc-3333").unwrap_err();
        assert_eq!(err, ExplorerError::SessionNotFound("cccc-3333".to_string()));
    }

    #[tokio::test]
    async fn test_directory_token_failure_names_tenant() {
        let session = session("tenant-x", Arc::new(FixedCredential::failing()));
        let err = session.directory_token().await.unwrap_err();
        match err {
            ExplorerError::DirectoryToken { tenant, message } => {
                assert_eq!(tenant, "tenant-x");
                assert!(message.contains("AADSTS700082"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_redacts_tokens() {
        let token = DirectoryToken {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
        };
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("secret"));
    }
}
