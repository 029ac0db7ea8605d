pub mod tree;
pub mod watch;

use acr_explorer::account::StaticAccount;
use acr_explorer::management::ArmClient;
use acr_explorer::registry::RegistryClient;
use acr_explorer::settings::Settings;
use acr_explorer::tree::{ExplorerServices, RootNode};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load settings from `path`, or from the config directory when absent
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let document = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Settings::from_toml_str(&document)
                .with_context(|| format!("Invalid config file {}", path.display()))
        }
        None => Settings::new().context("Failed to load settings"),
    }
}

pub fn check_config(path: Option<&Path>) -> Result<()> {
    println!("Checking explorer configuration...");
    match load_settings(path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!(
                "  {} session(s), {} subscription(s)",
                settings.azure.sessions.len(),
                settings.azure.subscriptions.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Wire the settings-backed account, ARM and registry clients into a root node
pub fn build_root(settings: &Settings) -> Arc<RootNode> {
    let http_client = reqwest::Client::new();

    let account = Arc::new(StaticAccount::from_settings(
        http_client.clone(),
        &settings.azure,
    ));
    let management = Arc::new(ArmClient::new(
        http_client.clone(),
        &settings.azure.management_api_version,
    ));
    let registry = RegistryClient::new(http_client, &settings.registry);

    info!(
        sessions = settings.azure.sessions.len(),
        subscriptions = settings.azure.subscriptions.len(),
        "Explorer configured"
    );

    RootNode::new(Arc::new(ExplorerServices {
        account,
        management,
        registry,
        settings: settings.explorer.clone(),
    }))
}
