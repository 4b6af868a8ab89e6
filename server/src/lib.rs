//! castline server: wires the engine, the encoder toolchain and the HTTP
//! surface together.

mod config;

pub use config::Args;

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use castline_encoder::create_toolchain;
use castline_engine::create_engine;
use castline_ipc::{command_channel, event_channel, EngineCommand, EngineEvent};
use castline_transport::{create_router, serve, HttpState};
use crossbeam_channel::Receiver;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging.
pub fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "castline=info,castline_engine=info,castline_encoder=info,castline_transport=info".into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Run the server until SIGINT/SIGTERM, then tear down every session.
pub fn run(args: Args) -> anyhow::Result<()> {
    info!("castline starting");
    let config = args.orchestrator_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("castline-rt")
        .build()
        .context("failed to build tokio runtime")?;

    let toolchain = create_toolchain(&args.ffmpeg, &args.ffprobe, config.probe_timeout);
    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();

    let (mut engine, orchestrator) = create_engine(
        config.clone(),
        toolchain,
        command_rx,
        event_tx,
        runtime.handle().clone(),
    )?;

    let engine_thread = thread::Builder::new()
        .name("castline-engine".into())
        .spawn(move || engine.run())
        .context("failed to spawn engine thread")?;
    let events_thread = thread::Builder::new()
        .name("castline-events".into())
        .spawn(move || log_events(event_rx))
        .context("failed to spawn event thread")?;

    let router = create_router(HttpState {
        orchestrator,
        hooks: Arc::new(command_tx.clone()),
        media_root: config.media_root.clone(),
        trusted_proxies: args.trusted_proxies.clone().into(),
    });

    let served = runtime.block_on(async {
        let listener = TcpListener::bind(args.http_addr)
            .await
            .with_context(|| format!("failed to bind {}", args.http_addr))?;
        serve(listener, router, shutdown_signal()).await?;
        anyhow::Ok(())
    });
    if let Err(ref e) = served {
        error!(error = %e, "HTTP server failed");
    }

    info!("Stopping engine");
    if command_tx.send(EngineCommand::Shutdown).is_err() {
        warn!("Engine already stopped");
    }
    drop(command_tx);
    engine_thread
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;
    events_thread
        .join()
        .map_err(|_| anyhow!("event thread panicked"))?;

    info!("castline stopped");
    served
}

fn log_events(events: Receiver<EngineEvent>) {
    for event in events.iter() {
        match event {
            EngineEvent::StartupFailed {
                ref session_id,
                ref phase,
                ref message,
                ..
            } => {
                debug!(session_id = %session_id, phase = phase.name(), error = %message, "Startup failed event");
            }
            other => debug!(event = ?other, "Engine event"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
