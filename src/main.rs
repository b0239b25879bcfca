//! Ingress configuration sync engine.
//!
//! # Architecture Overview
//!
//! ```text
//!   rule files / resource API
//!        │  watch + list
//!        ▼
//!   ┌──────────────┐   filter    ┌──────────┐  compile   ┌──────────────┐
//!   │  reconciler  │ ──────────▶ │  rules   │ ─────────▶ │   compiler   │
//!   │ (single task)│             └──────────┘            └──────┬───────┘
//!   └──────┬───────┘                                            │ document
//!          │ apply (timeout, backoff)                           ▼
//!          ▼                                             render + hash
//!   ┌──────────────┐  Arc<Snapshot>  ┌──────────┐
//!   │  LiveConfig  │ ──────────────▶ │  proxy   │ ◀── client traffic
//!   │  (arc-swap)  │ ──────────────▶ │  admin   │ ◀── ingress-cli
//!   └──────────────┘                 └──────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ingress_sync::admin::{self, AdminState};
use ingress_sync::config::{load_config, IngressConfig};
use ingress_sync::lifecycle::{signals, spawn_controller, startup, Shutdown};
use ingress_sync::observability::{logging, metrics};
use ingress_sync::HttpServer;

#[derive(Parser)]
#[command(name = "ingress-sync")]
#[command(about = "Ingress controller configuration sync engine", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ignore catch-all rules (no host, no paths, default backend only).
    #[arg(long)]
    disable_catch_all: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => IngressConfig::default(),
    };
    if args.disable_catch_all {
        config.controller.suppress_catch_all = true;
    }

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        suppress_catch_all = config.controller.suppress_catch_all,
        "ingress-sync starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let source = startup::source_from_config(&config.controller);
    let target = startup::target_from_config(&config.controller);
    let controller = spawn_controller(config.controller.clone(), source, target, &shutdown);

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            live: controller.live.clone(),
            loop_state: controller.state.clone(),
            api_key: config.admin.api_key.as_str().into(),
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, controller.live.clone());
    server.run(listener, shutdown.subscribe()).await?;

    if let Err(e) = controller.task.await {
        tracing::error!(error = %e, "Reconciler task failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
