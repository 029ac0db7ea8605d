use super::TreeNode;
use crate::error::{ExplorerError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Expansion = Shared<BoxFuture<'static, Result<Vec<TreeNode>>>>;

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    expansion: Expansion,
}

type InFlightMap = Arc<Mutex<HashMap<String, InFlight>>>;

/// Runs node expansions for a host, one at a time per node.
///
/// Concurrent [`expand`](Expander::expand) calls for the same node share a
/// single in-flight expansion. [`refresh_expand`](Expander::refresh_expand)
/// cancels whatever is in flight for the node and starts over; callers still
/// waiting on the old expansion receive [`ExplorerError::Cancelled`].
/// Finished expansions are forgotten, so children are never cached.
#[derive(Default)]
pub struct Expander {
    in_flight: InFlightMap,
    generation: AtomicU64,
}

impl Expander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children of `node`, joining an expansion already in flight
    pub async fn expand(&self, node: &TreeNode) -> Result<Vec<TreeNode>> {
        let expansion = {
            let mut in_flight = lock(&self.in_flight);
            let key = node.id();
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(node = %key, "Joining in-flight expansion");
                    existing.expansion.clone()
                }
                None => self.start(&mut in_flight, key, node),
            }
        };
        expansion.await
    }

    /// Children of `node`, superseding any expansion already in flight
    pub async fn refresh_expand(&self, node: &TreeNode) -> Result<Vec<TreeNode>> {
        let expansion = {
            let mut in_flight = lock(&self.in_flight);
            let key = node.id();
            if let Some(stale) = in_flight.remove(&key) {
                debug!(node = %key, "Cancelling superseded expansion");
                stale.cancel.cancel();
            }
            self.start(&mut in_flight, key, node)
        };
        expansion.await
    }

    /// Cancel the expansion in flight for `node`, if any
    pub fn cancel(&self, node: &TreeNode) -> bool {
        match lock(&self.in_flight).remove(&node.id()) {
            Some(stale) => {
                stale.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of expansions currently in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    fn start(
        &self,
        in_flight: &mut HashMap<String, InFlight>,
        key: String,
        node: &TreeNode,
    ) -> Expansion {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let node = node.clone();
        let token = cancel.clone();
        let entries = Arc::clone(&self.in_flight);
        let id = key.clone();
        let expansion = async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(ExplorerError::Cancelled(id.clone())),
                children = node.get_children() => children,
            };

            let mut in_flight = lock(&entries);
            if in_flight.get(&id).map(|entry| entry.generation) == Some(generation) {
                in_flight.remove(&id);
            }
            result
        }
        .boxed()
        .shared();

        in_flight.insert(
            key,
            InFlight {
                generation,
                cancel,
                expansion: expansion.clone(),
            },
        );
        expansion
    }
}

impl fmt::Debug for Expander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expander")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn lock(entries: &InFlightMap) -> MutexGuard<'_, HashMap<String, InFlight>> {
    match entries.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
