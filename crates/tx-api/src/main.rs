//! Transmitter Fleet Monitoring Service
//!
//! Init order matters: storage (connect + schema bootstrap), then the poll
//! scheduler's first reload, then the trap receiver, then HTTP. Exit is
//! non-zero when storage is unreachable, schema init fails, or a mandatory
//! privileged trap bind fails without a fallback.

mod config;
mod db;
mod error;
mod poller;
mod routes;
mod traps;
mod walkdump;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tx_core::MibMapper;

use config::AppConfig;
use db::Store;
use poller::PollScheduler;
use traps::TrapReceiver;

/// Application state shared across handlers.
pub struct AppState {
    pub store: Store,
    pub poller: PollScheduler,
    pub mib: MibMapper,
    pub config: AppConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tx_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting transmitter fleet monitor");

    let app_config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let store = match Store::connect(&app_config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            error!("cannot reach database: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = store.initialize_schema().await {
        error!("schema initialization failed: {e}");
        return ExitCode::FAILURE;
    }

    let mut mib = MibMapper::with_defaults();
    match mib.load_dir(&app_config.mib_dir) {
        Ok(0) => {}
        Ok(count) => info!(count, dir = %app_config.mib_dir.display(), "MIB mappings loaded"),
        Err(e) => warn!("MIB directory not loaded: {e}"),
    }

    let scheduler = PollScheduler::new(store.clone());
    if let Err(e) = scheduler.start().await {
        // Storage was reachable a moment ago; start degraded rather than
        // refusing to serve.
        warn!("initial poller start failed: {e}");
    }

    let receiver = TrapReceiver::new(store.clone(), app_config.trap.clone());
    let trap_socket = match receiver.bind().await {
        Ok(socket) => socket,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let trap_task = tokio::spawn(receiver.run(trap_socket));

    let state = Arc::new(AppState {
        store,
        poller: scheduler.clone(),
        mib,
        config: app_config.clone(),
    });
    let app = routes::build_router(state);

    let addr = ("0.0.0.0", app_config.http_port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind HTTP port {}: {e}", app_config.http_port);
            return ExitCode::FAILURE;
        }
    };
    info!("listening on 0.0.0.0:{}", app_config.http_port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }

    scheduler.stop().await;
    trap_task.abort();
    info!("shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for shutdown signal: {e}");
    }
}
