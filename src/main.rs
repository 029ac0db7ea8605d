use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use instead of the config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the registry tree
    Tree {
        /// Number of levels to expand below the root
        #[arg(long, short, default_value = "3")]
        depth: usize,
    },
    /// List the children of the root, a registry or a repository
    #[command(visible_alias = "l")]
    Ls {
        /// `registry[/repository]`, e.g. myreg.azurecr.io/app
        path: Option<String>,
    },
    /// Print a line for every tree change until interrupted
    #[command(visible_alias = "w")]
    Watch,
    /// Check configuration for errors and unused options
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Commands::CheckConfig = &cli.command {
        return cli::check_config(cli.config.as_deref());
    }

    let settings = cli::load_settings(cli.config.as_deref())?;
    let root = cli::build_root(&settings);

    match &cli.command {
        Commands::Tree { depth } => cli::tree::print_tree(&root, *depth).await?,
        Commands::Ls { path } => cli::tree::list_children(&root, path.as_deref()).await?,
        Commands::Watch => cli::watch::watch(&root).await?,
        Commands::CheckConfig => unreachable!("CheckConfig is handled before settings are loaded"),
    }

    Ok(())
}
