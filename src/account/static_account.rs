use super::{
    AccountEvent, AccountProvider, AccountStatus, RefreshTokenCredential, Session, Subscription,
};
use crate::settings::AzureSettings;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

struct AccountState {
    status: AccountStatus,
    sessions: Vec<Session>,
    subscriptions: Vec<Subscription>,
}

/// Account provider serving sessions and subscriptions from configuration
///
/// The account is `LoggedIn` as soon as at least one session is configured.
/// Mutations emit the matching [`AccountEvent`] to every subscriber.
pub struct StaticAccount {
    state: RwLock<AccountState>,
    events: broadcast::Sender<AccountEvent>,
}

impl StaticAccount {
    pub fn new(sessions: Vec<Session>, subscriptions: Vec<Subscription>) -> Self {
        let status = if sessions.is_empty() {
            AccountStatus::LoggedOut
        } else {
            AccountStatus::LoggedIn
        };
        let (events, _) = broadcast::channel(16);
        Self {
            state: RwLock::new(AccountState {
                status,
                sessions,
                subscriptions,
            }),
            events,
        }
    }

    /// Build the account from the `[azure]` settings section
    pub fn from_settings(http_client: reqwest::Client, settings: &AzureSettings) -> Self {
        let sessions = settings
            .sessions
            .iter()
            .map(|s| Session {
                tenant_id: s.tenant_id.clone(),
                user_name: s.user_name.clone(),
                environment: settings.environment.clone(),
                credential: Arc::new(RefreshTokenCredential::new(
                    http_client.clone(),
                    &settings.environment.directory_endpoint,
                    &s.tenant_id,
                    &s.client_id,
                    &s.refresh_token,
                )),
            })
            .collect();

        let subscriptions = settings
            .subscriptions
            .iter()
            .map(|s| Subscription {
                id: format!("/subscriptions/{}", s.subscription_id),
                subscription_id: s.subscription_id.clone(),
                display_name: s
                    .display_name
                    .clone()
                    .unwrap_or_else(|| s.subscription_id.clone()),
                tenant_id: s.tenant_id.clone(),
                state: s.state.clone(),
            })
            .collect();

        Self::new(sessions, subscriptions)
    }

    pub fn set_status(&self, status: AccountStatus) {
        self.with_state(|state| state.status = status);
        self.emit(AccountEvent::StatusChanged);
    }

    pub fn replace_sessions(&self, sessions: Vec<Session>) {
        self.with_state(|state| state.sessions = sessions);
        self.emit(AccountEvent::SessionsChanged);
    }

    pub fn set_subscriptions(&self, subscriptions: Vec<Subscription>) {
        self.with_state(|state| state.subscriptions = subscriptions);
        self.emit(AccountEvent::FiltersChanged);
    }

    fn with_state(&self, f: impl FnOnce(&mut AccountState)) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
    }

    fn read<T>(&self, f: impl FnOnce(&AccountState) -> T) -> T {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&state)
    }

    fn emit(&self, event: AccountEvent) {
        // No receivers is fine, nobody is watching the tree yet
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AccountProvider for StaticAccount {
    async fn wait_for_login(&self) -> bool {
        self.status() == AccountStatus::LoggedIn
    }

    fn status(&self) -> AccountStatus {
        self.read(|state| state.status)
    }

    fn sessions(&self) -> Vec<Session> {
        self.read(|state| state.sessions.clone())
    }

    fn filtered_subscriptions(&self) -> Vec<Subscription> {
        self.read(|state| state.subscriptions.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }

    async fn login(&self) -> Result<()> {
        anyhow::bail!(
            "Interactive sign-in is not available; add a session with a refresh token to the [azure] configuration"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::testing::{session, FixedCredential};
    use crate::settings::Settings;

    #[test]
    fn test_status_follows_configured_sessions() {
        let account = StaticAccount::new(Vec::new(), Vec::new());
        assert_eq!(account.status(), AccountStatus::LoggedOut);

        let account = StaticAccount::new(
            vec![session("t", Arc::new(FixedCredential::new("a", "r")))],
            Vec::new(),
        );
        assert_eq!(account.status(), AccountStatus::LoggedIn);
    }

    #[tokio::test]
    async fn test_mutations_emit_events() {
        let account = StaticAccount::new(Vec::new(), Vec::new());
        let mut events = account.subscribe();

        account.set_subscriptions(vec![Subscription::new("sub", "Dev", "t")]);
        account.set_status(AccountStatus::LoggingIn);
        account.replace_sessions(vec![session("t", Arc::new(FixedCredential::new("a", "r")))]);

        assert_eq!(events.recv().await.unwrap(), AccountEvent::FiltersChanged);
        assert_eq!(events.recv().await.unwrap(), AccountEvent::StatusChanged);
        assert_eq!(events.recv().await.unwrap(), AccountEvent::SessionsChanged);
        assert_eq!(account.filtered_subscriptions().len(), 1);
        assert_eq!(account.sessions().len(), 1);
        assert!(!account.wait_for_login().await);
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::from_toml_str(
            r#"
[[azure.sessions]]
tenant_id = "tenant-a"
refresh_token = "rt"

[[azure.subscriptions]]
subscription_id = "sub-1"
tenant_id = "tenant-a"
"#,
        )
        .unwrap();

        let account = StaticAccount::from_settings(reqwest::Client::new(), &settings.azure);
        assert_eq!(account.status(), AccountStatus::LoggedIn);
        let subscriptions = account.filtered_subscriptions();
        assert_eq!(subscriptions[0].display_name, "sub-1");
        assert_eq!(subscriptions[0].id, "/subscriptions/sub-1");
        assert_eq!(account.sessions()[0].tenant_id, "tenant-a");
    }

    #[tokio::test]
    async fn test_login_is_not_interactive() {
        let account = StaticAccount::new(Vec::new(), Vec::new());
        assert!(account.login().await.is_err());
    }
}
