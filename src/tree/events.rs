use crate::account::AccountEvent;
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Tells the host to query the root's children again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChange {
    /// Explicit refresh, or account events were missed
    Refreshed,
    Account(AccountEvent),
}

/// Forwards account events onto the single stream the host observes
///
/// Forwarding starts on construction and stops when the notifier is dropped.
pub struct ChangeNotifier {
    sender: broadcast::Sender<TreeChange>,
    shutdown: CancellationToken,
}

impl ChangeNotifier {
    /// Start forwarding `events`; must be called inside a Tokio runtime
    pub fn spawn(mut events: broadcast::Receiver<AccountEvent>) -> Self {
        let (sender, _) = broadcast::channel(32);
        let shutdown = CancellationToken::new();

        let forward = sender.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            debug!(event = ?event, "Account changed, notifying tree");
                            let _ = forward.send(TreeChange::Account(event));
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Missed account events, requesting full refresh");
                            let _ = forward.send(TreeChange::Refreshed);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Tree change forwarding stopped");
        });

        Self { sender, shutdown }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeChange> {
        self.sender.subscribe()
    }

    /// Emit a change; returns the number of host subscribers reached
    pub fn notify(&self, change: TreeChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
