//! Army list sync client
//!
//! Operates on a file-backed local store and syncs it to a remote that is
//! either a shared directory or an HTTP document service:
//!
//!   armylist --user alice status
//!   armylist --user alice --remote /mnt/share/armylist push
//!   armylist --user alice --remote https://sync.example.com --token $TOKEN watch
//!
//! `watch` keeps automatic sync running and reads edit commands from stdin.

use anyhow::{Context, Result, bail};
use armylist_storage::{CategoryStore, ChangeEmitter, KeyValueStore, Record, SharedStorage};
use armylist_sync::{
    FsRemoteConfig, FsRemoteStore, HttpRemoteConfig, HttpRemoteStore, PullOutcome, RemoteStore,
    SyncConfig, SyncController, SyncError, SyncObserver, SyncService,
};
use armylist_types::{ChangeTopic, Identity, RecordId, SyncTimestamp};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "armylist")]
#[command(about = "Sync army lists, custom units and detachments")]
struct Args {
    /// Local storage file
    #[arg(short, long, env = "ARMYLIST_DATA", default_value = "armylist-data.json")]
    data: PathBuf,

    /// Remote: a directory path or an http(s):// base URL
    #[arg(short, long, env = "ARMYLIST_REMOTE", default_value = "armylist-remote")]
    remote: String,

    /// Signed-in user id
    #[arg(short, long, env = "ARMYLIST_USER")]
    user: Option<String>,

    /// ID token for the HTTP remote
    #[arg(long, env = "ARMYLIST_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show local record counts and remote sync state
    Status,
    /// Upload local data, replacing the remote copy
    Push,
    /// Replace local data with the remote copy
    Pull,
    /// Delete the remote copy
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Create a custom unit
    AddUnit {
        name: String,
        #[arg(long)]
        points: Option<u32>,
    },
    /// Run automatic sync and read edit commands from stdin
    Watch {
        /// Quiet period after an edit before pushing (ms)
        #[arg(long, default_value = "1000")]
        quiet_ms: u64,

        /// Full push cadence (seconds)
        #[arg(long, default_value = "60")]
        interval_secs: u64,
    },
}

impl Args {
    fn identity(&self) -> Result<Identity> {
        let uid = self
            .user
            .as_deref()
            .context("no user given; pass --user or set ARMYLIST_USER")?;
        Identity::new(uid).with_context(|| format!("invalid user id {uid:?}"))
    }

    async fn open_remote(&self) -> Result<Arc<dyn RemoteStore>> {
        if self.remote.starts_with("http://") || self.remote.starts_with("https://") {
            let remote = HttpRemoteStore::new(HttpRemoteConfig {
                base_url: self.remote.clone(),
                ..Default::default()
            })?;
            remote.set_token(self.token.clone()).await;
            Ok(Arc::new(remote))
        } else {
            Ok(Arc::new(FsRemoteStore::new(FsRemoteConfig {
                root: PathBuf::from(&self.remote),
            })))
        }
    }
}

/// Logs push outcomes while watching.
struct LogObserver;

impl SyncObserver for LogObserver {
    fn on_sync_start(&self) {
        debug!("Sync started");
    }

    fn on_sync_success(&self, last_synced: SyncTimestamp) {
        info!("Synced at {}", last_synced);
    }

    fn on_sync_failure(&self, error: &SyncError) {
        warn!("Sync failed: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let storage = SharedStorage::open(&args.data)
        .with_context(|| format!("failed to open local storage {}", args.data.display()))?;
    let remote = args.open_remote().await?;
    debug!("Using {} remote at {}", remote.provider_name(), args.remote);

    match &args.command {
        Command::Status => status(&args, &storage, remote).await,
        Command::Push => {
            let service = service(&storage, remote);
            let at = service.push(&args.identity()?).await?;
            println!("Pushed at {at}");
            Ok(())
        }
        Command::Pull => {
            let service = service(&storage, remote);
            match service.pull(&args.identity()?).await? {
                PullOutcome::NoRemoteData => println!("No remote data; local storage unchanged"),
                PullOutcome::Restored {
                    last_synced,
                    metadata,
                } => println!(
                    "Restored data last synced at {last_synced} ({} metadata documents)",
                    metadata.len()
                ),
            }
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete remote data without --yes");
            }
            service(&storage, remote).clear(&args.identity()?).await?;
            println!("Remote data deleted");
            Ok(())
        }
        Command::AddUnit { name, points } => {
            let units = CategoryStore::units(Arc::new(storage.context()), ChangeEmitter::new());
            let mut record = Record::new(units.generate_id(), name.trim());
            if let Some(points) = points {
                record = record.with_field("points", json!(points));
            }
            let id = record.id.clone();
            units.create(record)?;
            println!("Created unit {id}");
            Ok(())
        }
        Command::Watch {
            quiet_ms,
            interval_secs,
        } => {
            let config = SyncConfig {
                quiet_period_ms: *quiet_ms,
                push_interval_ms: interval_secs.saturating_mul(1_000),
                ..Default::default()
            };
            watch(&args, &storage, remote, config).await
        }
    }
}

fn service(storage: &SharedStorage, remote: Arc<dyn RemoteStore>) -> SyncService {
    SyncService::new(Arc::new(storage.context()), remote)
}

async fn status(args: &Args, storage: &SharedStorage, remote: Arc<dyn RemoteStore>) -> Result<()> {
    let local: Arc<dyn KeyValueStore> = Arc::new(storage.context());
    let emitter = ChangeEmitter::new();

    println!("Local storage: {}", args.data.display());
    for topic in ChangeTopic::ALL {
        let store = CategoryStore::new(topic, local.clone(), emitter.clone());
        println!("  {:<20} {}", store.category().storage_key(), store.get_all().len());
    }

    println!("Remote: {} ({})", args.remote, remote.provider_name());
    let Ok(identity) = args.identity() else {
        println!("  not signed in");
        return Ok(());
    };
    let service = SyncService::new(local, remote);
    if !service.has_remote_data(&identity).await? {
        println!("  {identity}: nothing synced yet");
        return Ok(());
    }
    match service.last_synced_at(&identity).await? {
        Some(at) => println!("  {identity}: last synced {at}"),
        None => println!("  {identity}: remote data without a sync stamp"),
    }
    Ok(())
}

async fn watch(
    args: &Args,
    storage: &SharedStorage,
    remote: Arc<dyn RemoteStore>,
    config: SyncConfig,
) -> Result<()> {
    let identity = args.identity()?;
    let context = storage.context();
    let emitter = ChangeEmitter::new();
    let controller = SyncController::new(context.clone(), emitter.clone(), remote, config)
        .with_observer(Arc::new(LogObserver));
    let units = CategoryStore::units(Arc::new(context), emitter);

    controller.set_identity(Some(identity.clone()));
    println!("Watching as {identity}. Commands: add <name>, rename <id> <name>, delete <id>, list, sync, restore, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match run_line(&controller, &units, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => warn!("{:#}", e),
                }
            }
        }
    }

    info!("Flushing before exit");
    if let Err(e) = controller.sync_now().await {
        warn!("Final push failed: {}", e);
    }
    controller.shutdown();
    Ok(())
}

/// Runs one interactive command. Returns `false` to stop watching.
async fn run_line(controller: &SyncController, units: &CategoryStore, line: &str) -> Result<bool> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match cmd {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "add" if !rest.is_empty() => {
            let record = Record::new(units.generate_id(), rest);
            let id = record.id.clone();
            units.create(record)?;
            println!("Created unit {id}");
        }
        "rename" => {
            let (id, name) = rest
                .split_once(' ')
                .context("usage: rename <id> <name>")?;
            let id = RecordId::from(id);
            let mut record = units
                .get(&id)
                .with_context(|| format!("no unit {id}"))?;
            if units.is_name_taken(name, Some(&id)) {
                bail!("name {name:?} is already used");
            }
            record.name = name.trim().to_string();
            units.update(record)?;
            println!("Renamed {id}");
        }
        "delete" if !rest.is_empty() => {
            if units.delete(&RecordId::from(rest))? {
                println!("Deleted {rest}");
            } else {
                println!("No unit {rest}");
            }
        }
        "list" => {
            for (id, record) in units.get_all() {
                println!("  {id}  {}", record.name);
            }
        }
        "sync" => {
            let at = controller.sync_now().await?;
            println!("Pushed at {at}");
        }
        "restore" => match controller.restore().await? {
            PullOutcome::NoRemoteData => println!("No remote data"),
            PullOutcome::Restored { last_synced, .. } => {
                println!("Restored data last synced at {last_synced}")
            }
        },
        "status" => {
            if let Some(status) = controller.status() {
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        }
        other => println!("Unknown command {other:?}"),
    }
    Ok(true)
}
