use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use moments_interact::{EventKind, HttpTransport, Interactions, PageEvent, PageSnapshot, Settings};
use serde::Deserialize;
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
struct Args {
    /// Page snapshot (.json) as rendered by the server
    page: PathBuf,

    /// Settings file (.json), defaults are used for anything it leaves out
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Server the page's endpoints are relative to
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    base_url: String,

    /// Gestures to replay against the page (.json)
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// How long to keep the page alive after the last gesture, in milliseconds
    #[arg(long, default_value_t = 1000)]
    settle: u64,

    /// How verbose the output should be, can be set up to 3 times. Has no effect if RUST_LOG is set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to output log to
    #[arg(short, long)]
    log_path: Option<PathBuf>,
}

/// One line of an event script.
#[derive(Debug, Deserialize)]
struct ScriptedEvent {
    /// Delay before this gesture, relative to the previous one
    #[serde(default)]
    after_ms: u64,
    kind: EventKind,
    /// Node id the gesture lands on
    target: String,
}

// single-threaded like the page it stands in for
#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    tracing_init(&args)?;
    debug!(?args);

    let snapshot: PageSnapshot = serde_json::from_reader(File::open(&args.page).wrap_err("could not open page snapshot")?)
        .wrap_err("invalid page snapshot")?;
    let settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let script: Vec<ScriptedEvent> = match &args.events {
        Some(path) => serde_json::from_reader(File::open(path).wrap_err("could not open event script")?)
            .wrap_err("invalid event script")?,
        None => Vec::new(),
    };

    let transport = Arc::new(HttpTransport::new(args.base_url.clone()));
    let interactions = Interactions::init(snapshot, settings, transport)?;

    let mut pending = Vec::new();
    for event in script {
        tokio::time::sleep(Duration::from_millis(event.after_ms)).await;

        let Some(target) = interactions.page().read(|doc| doc.find(&event.target)) else {
            warn!(target = %event.target, "event targets unknown node, skipping");
            continue;
        };
        debug!(kind = ?event.kind, target = %event.target, "replaying");
        pending.extend(interactions.dispatch(PageEvent::new(event.kind, target)));
    }

    for task in pending {
        task.await.map_err(|e| eyre!("interaction task failed: {e}"))?;
    }
    tokio::time::sleep(Duration::from_millis(args.settle)).await;

    let state = interactions.page().read(|doc| doc.state());
    println!("{}", serde_json::to_string_pretty(&state)?);

    if let Some(log_path) = args.log_path {
        info!("wrote logs to {}", log_path.display());
    }
    Ok(())
}

fn tracing_init(args: &Args) -> color_eyre::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(
            match args.verbose {
                0 => "moments_interact=info",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
            .parse()?,
        )
        .from_env_lossy();

    // stdout carries the resulting page state
    let console = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(io::stderr)
        .with_filter(env_filter);

    let file_log = match &args.log_path {
        Some(log_path) => {
            let log_file = File::create(log_path).wrap_err("could not create log file")?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Mutex::new(log_file))
                    .with_filter(tracing::level_filters::LevelFilter::TRACE),
            )
        }
        None => None,
    };

    tracing_subscriber::registry().with(console).with(file_log).try_init()?;
    Ok(())
}
