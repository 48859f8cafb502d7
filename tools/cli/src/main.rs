//! Nodesync CLI - Command line interface for namespace operations.
//!
//! This tool drives the sync engine against a JSON-persisted namespace and
//! prints the events each command produces.

mod config;
mod session;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nodesync_common::{Error, NodePath};
use nodesync_coord::CreateMode;

use config::CliConfig;
use session::Session;

#[derive(Parser)]
#[command(name = "nodesync")]
#[command(about = "Nodesync - Hierarchical namespace mirroring")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store file holding the namespace.
    #[arg(short, long, conflicts_with = "alias")]
    store: Option<PathBuf>,

    /// Named store from the config file.
    #[arg(short, long)]
    alias: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every node in the namespace.
    Tree,

    /// Print nodes whose path fully matches a regular expression.
    Find {
        /// Pattern matched against the whole path.
        pattern: String,
    },

    /// Show node metadata.
    Stat {
        /// Node path.
        path: String,
    },

    /// Print node data.
    Get {
        /// Node path.
        path: String,
    },

    /// Replace node data.
    Set {
        /// Node path.
        path: String,

        /// New contents.
        data: String,

        /// Expected current version (default: any).
        #[arg(long)]
        version: Option<i32>,
    },

    /// Create a node and any missing parents.
    Create {
        /// Node path.
        path: String,

        /// Tie the node to this invocation's session.
        #[arg(short, long)]
        ephemeral: bool,
    },

    /// Delete a node and everything below it.
    Delete {
        /// Node path.
        path: String,
    },

    /// Delete everything below a node, keeping the node.
    Trim {
        /// Node path.
        path: String,
    },

    /// Delete a node along with ancestors left without children.
    Prune {
        /// Node path.
        path: String,
    },

    /// Manage store aliases.
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },
}

#[derive(Subcommand)]
enum AliasAction {
    /// Name a store file.
    Add {
        /// Alias name.
        name: String,

        /// Store file.
        store: PathBuf,
    },

    /// Forget an alias.
    Remove {
        /// Alias name.
        name: String,
    },

    /// List aliases.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => CliConfig::default_path().context("No config directory on this platform")?,
    };
    let config = CliConfig::load(&config_path).await?;

    if let Commands::Alias { action } = cli.command {
        return cmd_alias(config, &config_path, action).await;
    }

    let store = config.resolve_store(cli.store, cli.alias.as_deref())?;
    let settle = Duration::from_millis(config.settle_ms);

    match cli.command {
        Commands::Tree => cmd_tree(&store).await,
        Commands::Find { pattern } => cmd_find(&store, &pattern).await,
        Commands::Stat { path } => cmd_stat(&store, &path).await,
        Commands::Get { path } => cmd_get(&store, &path).await,
        Commands::Set {
            path,
            data,
            version,
        } => cmd_set(&store, settle, &path, data, version).await,
        Commands::Create { path, ephemeral } => {
            cmd_create(&store, settle, &path, ephemeral).await
        }
        Commands::Delete { path } => cmd_delete(&store, settle, &path).await,
        Commands::Trim { path } => cmd_trim(&store, settle, &path).await,
        Commands::Prune { path } => cmd_prune(&store, settle, &path).await,
        // Handled above.
        Commands::Alias { .. } => Ok(()),
    }
}

/// Parse a user-supplied path; a missing leading `/` is implied.
fn parse_path(raw: &str) -> Result<NodePath> {
    NodePath::parse_relative(raw).with_context(|| format!("Invalid path: {}", raw))
}

/// Print the events a mutation produced, then save.
async fn finish(mut session: Session, settle: Duration) -> Result<()> {
    for event in session.settle(settle).await {
        println!("{}", event);
    }
    session.close().await
}

/// Print the whole tree.
async fn cmd_tree(store: &Path) -> Result<()> {
    let session = Session::open(store).await?;
    let mut paths: Vec<NodePath> = session.engine().snapshot().await.into_iter().collect();
    paths.sort();

    for path in &paths {
        println!("{}", path);
    }
    session.close().await
}

/// Print nodes matching a pattern.
async fn cmd_find(store: &Path, pattern: &str) -> Result<()> {
    let session = Session::open(store).await?;
    let found = session.engine().matching(pattern).await?;

    if found.is_empty() {
        println!("No matching nodes.");
    }
    for path in &found {
        println!("{}", path);
    }
    session.close().await
}

/// Show node metadata.
async fn cmd_stat(store: &Path, raw: &str) -> Result<()> {
    let path = parse_path(raw)?;
    let session = Session::open(store).await?;

    let Some(stat) = session.engine().get_stat(&path).await? else {
        session.close().await?;
        bail!("No such node: {}", path);
    };

    println!("{}", path);
    println!("  Version: {}", stat.version);
    println!("  Child version: {}", stat.cversion);
    println!("  Children: {}", stat.num_children);
    println!("  Data length: {} bytes", stat.data_length);
    println!("  Created: {}", stat.created.to_rfc3339());
    println!("  Modified: {}", stat.modified.to_rfc3339());
    if let Some(owner) = stat.ephemeral_owner {
        println!("  Ephemeral owner: {}", owner);
    }
    session.close().await
}

/// Print node data.
async fn cmd_get(store: &Path, raw: &str) -> Result<()> {
    let path = parse_path(raw)?;
    let session = Session::open(store).await?;

    let data = session
        .engine()
        .get_data(&path)
        .await
        .context("Failed to read node")?;
    println!("{}", String::from_utf8_lossy(&data));
    session.close().await
}

/// Replace node data.
async fn cmd_set(
    store: &Path,
    settle: Duration,
    raw: &str,
    data: String,
    version: Option<i32>,
) -> Result<()> {
    let path = parse_path(raw)?;
    let session = Session::open(store).await?;

    let stat = match session
        .engine()
        .set_data(&path, version, data.into_bytes())
        .await
    {
        Ok(stat) => stat,
        Err(e) => {
            session.close().await?;
            return Err(match e {
                Error::VersionConflict {
                    expected, actual, ..
                } => anyhow!(
                    "Version mismatch on {}: expected {}, found {}",
                    path,
                    expected,
                    actual
                ),
                e => anyhow::Error::new(e).context("Failed to set data"),
            });
        }
    };

    info!("{} now at version {}", path, stat.version);
    finish(session, settle).await
}

/// Create a node.
async fn cmd_create(store: &Path, settle: Duration, raw: &str, ephemeral: bool) -> Result<()> {
    let path = parse_path(raw)?;
    let mode = if ephemeral {
        CreateMode::Ephemeral
    } else {
        CreateMode::Persistent
    };
    let session = Session::open(store).await?;

    if !session.engine().create(&path, mode).await? {
        println!("{} already exists.", path);
    }
    if ephemeral {
        println!("Ephemeral node {} ends with this session.", path);
    }
    finish(session, settle).await
}

/// Delete a subtree.
async fn cmd_delete(store: &Path, settle: Duration, raw: &str) -> Result<()> {
    let path = parse_path(raw)?;
    let session = Session::open(store).await?;

    session
        .engine()
        .delete(&path)
        .await
        .with_context(|| format!("Failed to delete {}", path))?;
    finish(session, settle).await
}

/// Delete a node's descendants.
async fn cmd_trim(store: &Path, settle: Duration, raw: &str) -> Result<()> {
    let path = parse_path(raw)?;
    let session = Session::open(store).await?;

    session
        .engine()
        .trim(&path)
        .await
        .with_context(|| format!("Failed to trim {}", path))?;
    finish(session, settle).await
}

/// Delete a node and its lonely ancestors.
async fn cmd_prune(store: &Path, settle: Duration, raw: &str) -> Result<()> {
    let path = parse_path(raw)?;
    let session = Session::open(store).await?;

    match session
        .engine()
        .prune(&path)
        .await
        .with_context(|| format!("Failed to prune {}", path))?
    {
        Some(survivor) => info!("Pruned up to {}", survivor),
        None => println!("{} does not exist.", path),
    }
    finish(session, settle).await
}

/// Manage aliases.
async fn cmd_alias(mut config: CliConfig, config_path: &Path, action: AliasAction) -> Result<()> {
    match action {
        AliasAction::Add { name, store } => {
            println!("Alias {} -> {}", name, store.display());
            config.aliases.insert(name, store);
            config.save(config_path).await
        }
        AliasAction::Remove { name } => {
            if config.aliases.remove(&name).is_none() {
                bail!("Unknown alias: {}", name);
            }
            println!("Alias {} removed.", name);
            config.save(config_path).await
        }
        AliasAction::List => {
            if config.aliases.is_empty() {
                println!("No aliases defined.");
            }
            for (name, store) in &config.aliases {
                println!("{} -> {}", name, store.display());
            }
            Ok(())
        }
    }
}
