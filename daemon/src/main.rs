//! Photo Shield daemon: entry point for running a node and for operator
//! tasks against its store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use shield_ledger::DownloadLedger;
use shield_node::{open_store, NodeConfig, ShieldNode};
use shield_store_lmdb::check_integrity;
use shield_types::{Points, SystemClock, UserId};

#[derive(Parser)]
#[command(name = "shield-daemon", about = "Photo Shield content protection service")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "SHIELD_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for LMDB storage.
    #[arg(long, env = "SHIELD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Public content root served to clients.
    #[arg(long, env = "SHIELD_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// The canonical protection mark image.
    #[arg(long, env = "SHIELD_PROTECTION_MARK")]
    protection_mark: Option<PathBuf>,

    /// Base URL of the detection server.
    #[arg(long, env = "SHIELD_DETECTION_URL")]
    detection_url: Option<String>,

    /// Per-request timeout for detection calls, in seconds.
    #[arg(long, env = "SHIELD_DETECTION_TIMEOUT_SECS")]
    detection_timeout_secs: Option<u64>,

    /// HTTP API port.
    #[arg(long, env = "SHIELD_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Request body limit for uploads, in bytes.
    #[arg(long, env = "SHIELD_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Candidates fetched per registry read during a scan.
    #[arg(long, env = "SHIELD_SCAN_PAGE_SIZE")]
    scan_page_size: Option<usize>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SHIELD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SHIELD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Inspect or fund point accounts.
    #[command(name = "accounts")]
    Accounts {
        #[command(subcommand)]
        action: AccountsAction,
    },
    /// Store maintenance.
    #[command(name = "store")]
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Serve the HTTP API until SIGINT/SIGTERM.
    Run,
}

#[derive(clap::Subcommand)]
enum AccountsAction {
    /// Grant points to a user, opening the account if needed.
    Credit {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        points: u64,
    },
    /// Print a user's balance and download history.
    Show {
        #[arg(long)]
        user: u64,
    },
}

#[derive(clap::Subcommand)]
enum StoreAction {
    /// Run the LMDB integrity check.
    Check,
}

impl Cli {
    /// Load the file config (or defaults) and apply flag/env overrides.
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(v) = &self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(v) = &self.public_dir {
            config.public_dir = v.clone();
        }
        if let Some(v) = &self.protection_mark {
            config.protection_mark = v.clone();
        }
        if let Some(v) = &self.detection_url {
            config.detection_url = v.clone();
        }
        if let Some(v) = self.detection_timeout_secs {
            config.detection_timeout_secs = v;
        }
        if let Some(v) = self.rpc_port {
            config.rpc_port = v;
        }
        if let Some(v) = self.max_upload_bytes {
            config.max_upload_bytes = v;
        }
        if let Some(v) = self.scan_page_size {
            config.scan_page_size = v;
        }
        if let Some(v) = &self.log_format {
            config.log_format = v.clone();
        }
        if let Some(v) = &self.log_level {
            config.log_level = v.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.node_config()?;
    shield_utils::init_logging(config.log_format()?, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Run => {
                tracing::info!(
                    "Starting Photo Shield node (HTTP:{}, detection:{})",
                    config.rpc_port,
                    config.detection_url,
                );
                let mut node = ShieldNode::new(config).await?;
                node.start().await?;

                tracing::info!("Shutdown signal received, stopping node");
                node.stop().await?;

                tracing::info!("Photo Shield daemon exited cleanly");
            }
        },
        Command::Accounts { action } => {
            let store = Arc::new(open_store(&config)?);
            let ledger = DownloadLedger::new(store, Arc::new(SystemClock));
            match action {
                AccountsAction::Credit { user, points } => {
                    let user = UserId::new(user);
                    ledger.open_account(user)?;
                    let balance = ledger.credit(user, Points::new(points))?;
                    println!("user {user}: balance {balance}");
                }
                AccountsAction::Show { user } => {
                    let user = UserId::new(user);
                    let balance = ledger.balance(user)?;
                    let downloads = ledger.downloads_for_user(user)?;
                    println!("user {user}: balance {balance}");
                    for record in downloads {
                        println!(
                            "  asset {} downloaded at {}",
                            record.asset,
                            record.created_at.as_millis()
                        );
                    }
                }
            }
        }
        Command::Store { action } => match action {
            StoreAction::Check => {
                let store = open_store(&config)?;
                let report = check_integrity(&store)?;
                println!(
                    "{} databases, {} entries",
                    report.databases_checked, report.total_entries
                );
                for error in &report.errors {
                    println!("  error: {error}");
                }
                anyhow::ensure!(
                    report.is_healthy(),
                    "{} integrity problems found",
                    report.errors.len()
                );
                println!("store is healthy");
            }
        },
    }

    Ok(())
}
