//! Startup orchestration.
//!
//! # Order
//! 1. Passport client (failure disables the passport features, never fatal)
//! 2. Payload decoder and interceptor chain
//! 3. Backend spawn and readiness wait, raced against shutdown
//! 4. Listener bind (traffic only once the backend is ready)
//! 5. Serve until shutdown, drain, stop the backend

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{BackendError, BackendSupervisor};
use crate::config::{PassportConfig, ProxyConfig};
use crate::http::{ProxyServer, ServeError};
use crate::intercept::payload::decoder_from_config;
use crate::intercept::InterceptorChain;
use crate::lifecycle::shutdown::Shutdown;
use crate::passport::{HttpPassportClient, PassportClient};

/// Fatal startup or serve failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

/// Passport client for the configured endpoints, if any.
pub fn build_passport_client(config: &PassportConfig) -> Option<Arc<dyn PassportClient>> {
    if !config.has_endpoint() {
        tracing::warn!("Passport client not configured, passport features disabled");
        return None;
    }

    match HttpPassportClient::new(config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Passport client init failed, passport features disabled");
            None
        }
    }
}

/// Run the proxy until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let client = build_passport_client(&config.passport);
    let decoder = decoder_from_config(&config.identifiers);
    let chain = InterceptorChain::from_config(&config.passport, client, decoder);

    let backend = Arc::new(BackendSupervisor::new(&config.backend));
    backend.start().await?;

    let ready = tokio::select! {
        ready = backend.wait_ready() => ready,
        _ = shutdown.wait() => {
            tracing::info!("Shutdown requested during startup");
            backend.stop().await;
            return Ok(());
        }
    };

    if let Err(e) = ready {
        backend.stop().await;
        return Err(e.into());
    }

    let server = ProxyServer::new(&config.listener, backend, chain);
    server
        .serve(
            &config.listener.bind_address,
            shutdown.token(),
            config.shutdown.grace(),
        )
        .await?;

    Ok(())
}
