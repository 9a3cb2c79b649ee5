//! Request/response interception subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request (body buffered once)
//!     → InterceptorChain::run_request   (in order; first error aborts the relay)
//!     → backend
//!     → InterceptorChain::run_response  (in order; errors logged, never propagated)
//!     → client
//! ```
//!
//! # Design Decisions
//! - The chain is built once at startup and never changes afterwards
//! - Interceptors see immutable views, so the relayed bytes are the inspected bytes
//! - Interceptors keep no per-request state; one instance serves all requests
//! - Passport calls race the relay's cancellation token and resolve to "skip"

pub mod classify;
pub mod device_init;
pub mod onboarding;
pub mod payload;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Request, Response};
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::PassportConfig;
use crate::observability::metrics;
use crate::passport::PassportClient;

pub use classify::MessageType;
pub use device_init::DeviceInitInterceptor;
pub use onboarding::OnboardingInterceptor;
pub use payload::{FixedIdentifiers, OpaquePayload, PayloadDecoder};

/// Errors raised by interceptors.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// Request-stage fault; the relay answers 500 without contacting the backend.
    #[error("{interceptor} rejected request: {reason}")]
    Request {
        interceptor: &'static str,
        reason: String,
    },

    /// Response-stage fault; logged, the response is relayed regardless.
    #[error("{interceptor} failed on response: {reason}")]
    Response {
        interceptor: &'static str,
        reason: String,
    },
}

/// Per-relay context handed to every interceptor call.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(request_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            request_id: request_id.into(),
            cancel,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run `fut` unless the relay is cancelled first; `None` means "skipped".
    pub async fn run_cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// A classifier + handler pair bound to one protocol stage.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn process_request(
        &self,
        _ctx: &CallContext,
        _request: &Request<Bytes>,
    ) -> Result<(), InterceptError> {
        Ok(())
    }

    async fn process_response(
        &self,
        _ctx: &CallContext,
        _response: &Response<Bytes>,
    ) -> Result<(), InterceptError> {
        Ok(())
    }
}

/// Ordered, immutable sequence of interceptors shared by all relays.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
    /// Insertion order is invocation order.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Wire the DI and TO2 interceptors the way the passport settings ask for.
    ///
    /// DI is added only when product passports are enabled, TO2 only when an
    /// owner id is configured. Both share the optional client and the decoder.
    pub fn from_config(
        passport: &PassportConfig,
        client: Option<Arc<dyn PassportClient>>,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> Self {
        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();

        if passport.enable_product_passport {
            interceptors.push(Arc::new(DeviceInitInterceptor::new(
                client.clone(),
                true,
                decoder.clone(),
            )));
            tracing::info!("DI interceptor enabled for product passport");
        }

        if let Some(owner_id) = passport.owner_id.as_deref().filter(|id| !id.is_empty()) {
            interceptors.push(Arc::new(OnboardingInterceptor::new(
                client,
                owner_id,
                decoder,
            )));
            tracing::info!(owner_id, "TO2 interceptor enabled for commissioning passport");
        }

        Self::new(interceptors)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run every request handler in order, stopping at the first error.
    pub async fn run_request(
        &self,
        ctx: &CallContext,
        request: &Request<Bytes>,
    ) -> Result<(), InterceptError> {
        for interceptor in self.interceptors.iter() {
            if let Err(e) = interceptor.process_request(ctx, request).await {
                metrics::record_interceptor_failure(interceptor.name(), "request");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run every response handler in order. Errors are logged and dropped.
    pub async fn run_response(&self, ctx: &CallContext, response: &Response<Bytes>) {
        for interceptor in self.interceptors.iter() {
            if let Err(e) = interceptor.process_response(ctx, response).await {
                metrics::record_interceptor_failure(interceptor.name(), "response");
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    interceptor = interceptor.name(),
                    error = %e,
                    "Response interceptor failed, relaying response unchanged"
                );
            }
        }
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_request: bool,
        fail_response: bool,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn process_request(
            &self,
            _ctx: &CallContext,
            _request: &Request<Bytes>,
        ) -> Result<(), InterceptError> {
            self.log.lock().unwrap().push(format!("{}:request", self.name));
            if self.fail_request {
                return Err(InterceptError::Request {
                    interceptor: self.name,
                    reason: "boom".into(),
                });
            }
            Ok(())
        }

        async fn process_response(
            &self,
            _ctx: &CallContext,
            _response: &Response<Bytes>,
        ) -> Result<(), InterceptError> {
            self.log.lock().unwrap().push(format!("{}:response", self.name));
            if self.fail_response {
                return Err(InterceptError::Response {
                    interceptor: self.name,
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn chain(log: &Arc<Mutex<Vec<String>>>, fail_request: bool, fail_response: bool) -> InterceptorChain {
        InterceptorChain::new(vec![
            Arc::new(Recorder {
                name: "first",
                log: log.clone(),
                fail_request,
                fail_response,
            }),
            Arc::new(Recorder {
                name: "second",
                log: log.clone(),
                fail_request: false,
                fail_response: false,
            }),
        ])
    }

    fn ctx() -> CallContext {
        CallContext::new("req-1", CancellationToken::new())
    }

    #[tokio::test]
    async fn runs_in_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, false, false);
        let request = Request::new(Bytes::new());
        let response = Response::new(Bytes::new());

        chain.run_request(&ctx(), &request).await.unwrap();
        chain.run_response(&ctx(), &response).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:request", "second:request", "first:response", "second:response"]
        );
    }

    #[tokio::test]
    async fn request_error_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, true, false);
        let err = chain
            .run_request(&ctx(), &Request::new(Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptError::Request { interceptor: "first", .. }));
        assert_eq!(*log.lock().unwrap(), vec!["first:request"]);
    }

    #[tokio::test]
    async fn response_error_does_not_stop_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, false, true);
        chain.run_response(&ctx(), &Response::new(Bytes::new())).await;
        assert_eq!(*log.lock().unwrap(), vec!["first:response", "second:response"]);
    }

    #[tokio::test]
    async fn cancelled_context_skips_work() {
        let token = CancellationToken::new();
        let ctx = CallContext::new("req-2", token.clone());
        token.cancel();
        let out = ctx.run_cancellable(async { 42 }).await;
        assert_eq!(out, None);

        let live = CallContext::new("req-3", CancellationToken::new());
        assert_eq!(live.run_cancellable(async { 7 }).await, Some(7));
    }

    #[test]
    fn from_config_follows_feature_switches() {
        let decoder: Arc<dyn PayloadDecoder> = Arc::new(OpaquePayload);

        let chain = InterceptorChain::from_config(&PassportConfig::default(), None, decoder.clone());
        assert!(chain.is_empty());

        let passport = PassportConfig {
            enable_product_passport: true,
            owner_id: Some("owner-1".into()),
            ..PassportConfig::default()
        };
        let chain = InterceptorChain::from_config(&passport, None, decoder);
        assert_eq!(chain.names(), vec!["device_init", "onboarding"]);
    }
}
