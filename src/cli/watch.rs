use acr_explorer::account::AccountEvent;
use acr_explorer::tree::{Expander, RootNode, TreeChange, TreeNode};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

fn describe(change: &TreeChange) -> &'static str {
    match change {
        TreeChange::Refreshed => "refresh requested",
        TreeChange::Account(AccountEvent::FiltersChanged) => "subscription filters changed",
        TreeChange::Account(AccountEvent::StatusChanged) => "account status changed",
        TreeChange::Account(AccountEvent::SessionsChanged) => "sessions changed",
    }
}

/// Re-list the root on every change notification until ctrl-c
pub async fn watch(root: &Arc<RootNode>) -> Result<()> {
    let expander = Expander::new();
    let node = TreeNode::Root(root.clone());
    let mut changes = root.subscribe();

    // Initial listing, as a host does on first render
    root.refresh();
    println!("Watching {} (press ctrl-c to stop)", root.label());

    loop {
        let change = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(change) => change,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Missed tree changes");
                    TreeChange::Refreshed
                }
                Err(RecvError::Closed) => break,
            },
        };

        match expander.refresh_expand(&node).await {
            Ok(children) => {
                let labels: Vec<&str> = children.iter().map(|c| c.label()).collect();
                println!(
                    "{}  {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                    describe(&change),
                    labels.join(", ")
                );
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
