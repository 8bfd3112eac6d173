//! pad-sync: link markdown notes to remote collaborative pads.
//!
//! Subcommands mirror the three user-facing actions (link, pull, open),
//! plus a watch mode that re-syncs notes as they change on disk and a
//! config command for the persisted server settings.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pad_sync_core::{
    EtherpadClient, EtherpadHtmlConverter, GatewayFactory, NoteHandle, PadConfig, PullReport,
    SyncEngine,
};

use pad_sync_cli::settings;
use pad_sync_cli::{EchoGuard, NativeStore, NoteWatcher};

#[derive(Parser, Debug)]
#[command(name = "pad-sync")]
#[command(about = "Sync markdown notes with remote collaborative pads")]
struct Args {
    /// Path to the vault directory containing the notes
    #[arg(short, long, default_value = ".")]
    vault: PathBuf,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a remote pad from a note and link the two
    Link {
        /// Note path relative to the vault
        note: String,
    },
    /// Overwrite a note's body with its linked pad's current content
    Pull {
        /// Note path relative to the vault
        note: String,
    },
    /// Print the public URL of a note's linked pad
    Open {
        /// Note path relative to the vault
        note: String,
    },
    /// Watch the vault and re-sync linked notes as they change
    Watch,
    /// Show or update the pad server settings
    Config {
        /// Pad server host
        #[arg(long)]
        host: Option<String>,
        /// Pad server port
        #[arg(long)]
        port: Option<u16>,
        /// API key for the pad server
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings_path = args.settings.unwrap_or_else(settings::default_path);

    match args.command {
        Command::Link { note } => {
            let config = settings::load(&settings_path)?;
            let engine = build_engine(args.vault);
            let report = engine.link(&NoteHandle::new(note), &config).await?;
            println!("linked to pad '{}'", report.pad_id);
            println!("{}", report.url);
        }
        Command::Pull { note } => {
            let config = settings::load(&settings_path)?;
            let engine = build_engine(args.vault);
            match engine.pull(&NoteHandle::new(note), &config).await? {
                PullReport::Updated { pad_id, .. } => {
                    println!("note updated from pad '{}'", pad_id);
                }
                PullReport::NotLinked => {
                    println!("note is not linked to a pad; nothing to pull");
                }
            }
        }
        Command::Open { note } => {
            let config = settings::load(&settings_path)?;
            let engine = build_engine(args.vault);
            match engine
                .resolve_view_url(&NoteHandle::new(note), &config)
                .await?
            {
                Some(url) => println!("{}", url),
                None => println!("note is not linked to a pad"),
            }
        }
        Command::Watch => {
            let engine = build_engine(args.vault.clone());
            watch(engine, args.vault, settings_path).await?;
        }
        Command::Config { host, port, api_key } => {
            let mut config = settings::load(&settings_path)?;
            let changed = host.is_some() || port.is_some() || api_key.is_some();
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(api_key) = api_key {
                config.api_key = api_key;
            }
            if changed {
                settings::save(&settings_path, &config)?;
            }
            println!("host: {}", config.host);
            println!("port: {}", config.port);
            let key_state = if config.api_key.is_empty() { "(none)" } else { "(set)" };
            println!("api key: {}", key_state);
        }
    }

    Ok(())
}

fn build_engine(vault: PathBuf) -> SyncEngine<NativeStore> {
    let factory: GatewayFactory = Box::new(|config| Box::new(EtherpadClient::new(config)));
    SyncEngine::new(NativeStore::new(vault), EtherpadHtmlConverter, factory)
}

/// Watch loop: each changed markdown note triggers a pull. Settings are
/// re-read per event so edits to them apply without restarting the watch.
async fn watch(
    engine: SyncEngine<NativeStore>,
    vault: PathBuf,
    settings_path: PathBuf,
) -> Result<()> {
    let mut watcher = NoteWatcher::new(vault)?;
    let guard = EchoGuard::new();

    info!("watching vault for note changes (ctrl-c to stop)");
    while let Some(note) = watcher.next().await {
        // Skip events caused by our own write-backs.
        if guard.consume(&note) {
            continue;
        }

        let config = match settings::load(&settings_path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{:#}", err);
                continue;
            }
        };

        // Flag before pulling: the pull's own write must not retrigger us.
        guard.mark(&note);
        match engine.pull(&note, &config).await {
            Ok(PullReport::Updated { pad_id, .. }) => {
                info!(note = note.path(), pad_id = %pad_id, "note updated from pad");
            }
            Ok(PullReport::NotLinked) => {
                // Nothing was written; clear the unused flag.
                guard.consume(&note);
            }
            Err(err) => {
                guard.consume(&note);
                warn!(note = note.path(), "sync failed: {}", err);
            }
        }
    }

    Ok(())
}
