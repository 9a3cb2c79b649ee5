//! FDO Passport Proxy
//!
//! An intercepting reverse proxy in front of a supervised FDO server.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌───────────────────────────────────────────────────┐
//!                              │                 FDO PASSPORT PROXY                │
//!                              │                                                   │
//!     Device Request           │  ┌─────────┐    ┌─────────┐    ┌──────────────┐   │
//!     ─────────────────────────┼─▶│   net   │───▶│  http   │───▶│  intercept   │   │
//!                              │  │listener │    │ server  │    │ request side │   │
//!                              │  └─────────┘    └─────────┘    └──────┬───────┘   │
//!                              │                                       │           │
//!                              │                                       ▼           │      ┌──────────┐
//!     Device Response          │  ┌─────────┐    ┌──────────────┐  ┌────────┐      │      │   FDO    │
//!     ◀────────────────────────┼──│  http   │◀───│  intercept   │◀─│ hyper  │◀─────┼─────▶│ backend  │
//!                              │  │ server  │    │response side │  │ client │      │      │ (child)  │
//!                              │  └─────────┘    └──────┬───────┘  └────────┘      │      └──────────┘
//!                              │                        │                          │           ▲
//!                              │                        ▼                          │           │
//!                              │                ┌──────────────┐   ┌────────────┐  │           │
//!                              │                │   passport   │   │  backend   │──┼───────────┘
//!                              │                │    client    │   │ supervisor │  │
//!                              │                └──────────────┘   └────────────┘  │
//!                              └───────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use fdo_passport_proxy::cli::Cli;
use fdo_passport_proxy::lifecycle::{self, signals, Shutdown};
use fdo_passport_proxy::observability::{logging, metrics};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fdo-passport-proxy: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("fdo-passport-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        listen = %config.listener.bind_address,
        backend = %config.backend.authority(),
        fdo_path = %config.backend.working_dir.display(),
        enable_product_passport = config.passport.enable_product_passport,
        owner_id = ?config.passport.owner_id,
        "Configuration loaded"
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
    signals::spawn_signal_handler(shutdown.clone());

    if let Err(e) = lifecycle::run(config, shutdown).await {
        tracing::error!(error = %e, "Proxy server error");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}
