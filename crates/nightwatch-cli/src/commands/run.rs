//! The coordinator daemon.
//!
//! Hosts the engine loop, the reminder timers, and the HTTP surface. Cycle
//! completion is an event here, not an exit: the supervisor loop logs it and
//! re-arms the next cycle.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use log::{error, info};
use tokio::sync::mpsc;

use nightwatch_core::{
    Config, Engine, KvStore, LogNotifier, Notifier, Phase, ReminderScheduler, SqliteStore,
    WebhookNotifier,
};

use crate::server::{self, AppState};

#[derive(Args)]
pub struct RunArgs {
    /// Path to a config file (defaults to ~/.config/nightwatch/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the HTTP listen port
    #[arg(long)]
    pub port: Option<u16>,
    /// Use an in-memory store instead of the on-disk database
    #[arg(long)]
    pub ephemeral: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if config.roster.is_empty() {
        return Err("roster is empty; add [[roster]] entries to the config".into());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config, args))
}

async fn serve(config: Config, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn KvStore> = if args.ephemeral {
        Arc::new(SqliteStore::open_memory()?)
    } else {
        Arc::new(SqliteStore::open()?)
    };

    let notifier: Arc<dyn Notifier> = match &config.chat.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = ReminderScheduler::new(config.delays(), tx.clone());
    let mut engine = Engine::new(
        store.clone(),
        config.roster(),
        config.chat.affirmative.clone(),
        config.stats,
        scheduler,
        notifier,
    );

    let port = args.port.unwrap_or(config.http.port);
    let state = AppState {
        store,
        roster: config.roster(),
        stats_config: config.stats,
        tx,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, server::router(state)).await {
            error!("http server failed: {e}");
        }
    });

    engine.start_cycle()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                match engine.handle(event) {
                    Ok(Some(done)) => {
                        info!("cycle complete: entered {} phase", done.phase.as_str());
                        if done.phase == Phase::Sleeping {
                            // Everyone woke up; arm the next night.
                            if let Err(e) = engine.start_cycle() {
                                error!("failed to start next cycle: {e}");
                            }
                        }
                    }
                    Ok(None) => {}
                    // A store failure stalls the cycle; it does not corrupt
                    // it. Keep serving events.
                    Err(e) => error!("event handling failed: {e}"),
                }
            }
        }
    }
    Ok(())
}
