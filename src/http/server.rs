//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all relay handler
//! - Wire up middleware (tracing, request ID, body limit, timeout)
//! - Gate relays on backend readiness
//! - Run the interceptor chain around each forwarded exchange
//! - Drain in-flight relays on shutdown, then stop the backend

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{uri::PathAndQuery, HeaderMap, Method, Request, Uri, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::BytesMut;
use futures_util::{stream, StreamExt};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::backend::{BackendState, BackendSupervisor};
use crate::config::ListenerConfig;
use crate::http::request::{request_id, strip_hop_by_hop, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::RelayError;
use crate::intercept::classify::{request_message_type, response_message_type};
use crate::intercept::{CallContext, InterceptorChain};
use crate::net::connection::InFlightTracker;
use crate::net::listener::{self, ListenerError};
use crate::observability::metrics;

/// Errors that end `ProxyServer::serve`.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Listen(#[from] ListenerError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into the relay handler.
#[derive(Clone)]
struct RelayState {
    backend: Arc<BackendSupervisor>,
    chain: InterceptorChain,
    client: Client<HttpConnector, Body>,
    tracker: InFlightTracker,
    /// Largest response body buffered for the response chain.
    inspect_limit: usize,
    /// Parent of every relay's cancellation token; fired when the drain deadline passes.
    relay_cancel: CancellationToken,
}

/// The intercepting reverse proxy in front of the supervised backend.
pub struct ProxyServer {
    router: Router,
    backend: Arc<BackendSupervisor>,
    tracker: InFlightTracker,
    relay_cancel: CancellationToken,
}

impl ProxyServer {
    pub fn new(
        config: &ListenerConfig,
        backend: Arc<BackendSupervisor>,
        chain: InterceptorChain,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let tracker = InFlightTracker::new();
        let relay_cancel = CancellationToken::new();

        tracing::info!(
            interceptors = ?chain,
            backend = %backend.endpoint(),
            "Relay configured"
        );

        let state = RelayState {
            backend: backend.clone(),
            chain,
            client,
            tracker: tracker.clone(),
            inspect_limit: config.max_body_bytes,
            relay_cancel: relay_cancel.clone(),
        };

        Self {
            router: Self::build_router(config, state),
            backend,
            tracker,
            relay_cancel,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: RelayState) -> Router {
        Router::new()
            .route("/{*path}", any(relay))
            .route("/", any(relay))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Bind `address` and serve until `shutdown` fires.
    ///
    /// A bind failure stops the backend before returning.
    pub async fn serve(
        self,
        address: &str,
        shutdown: CancellationToken,
        grace: Duration,
    ) -> Result<(), ServeError> {
        let listener = match listener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                self.backend.stop().await;
                return Err(e.into());
            }
        };

        self.run(listener, shutdown, grace).await?;
        Ok(())
    }

    /// Serve on `listener` until `shutdown` fires, drain for up to `grace`,
    /// then stop the backend.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
        grace: Duration,
    ) -> Result<(), std::io::Error> {
        let ProxyServer {
            router,
            backend,
            tracker,
            relay_cancel,
        } = self;

        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!(address = %addr, backend = %backend.endpoint(), "HTTP server starting");

        let stop_accepting = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move { stop_accepting.cancelled().await })
                .await
        });

        let result = tokio::select! {
            joined = &mut server => flatten(joined),
            _ = shutdown.cancelled() => {
                tracing::info!(
                    in_flight = tracker.active_count(),
                    grace = ?grace,
                    "Draining in-flight relays"
                );

                match tokio::time::timeout(grace, &mut server).await {
                    Ok(joined) => flatten(joined),
                    Err(_) => {
                        tracing::warn!(
                            in_flight = tracker.active_count(),
                            "Drain deadline passed, cancelling remaining relays"
                        );
                        relay_cancel.cancel();
                        server.abort();
                        Ok(())
                    }
                }
            }
        };

        backend.stop().await;
        tracing::info!("HTTP server stopped");
        result
    }
}

fn flatten(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> std::io::Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::other(e)),
    }
}

/// Relay one request to the backend through the interceptor chain.
async fn relay(
    State(state): State<RelayState>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let _in_flight = state.tracker.track();
    let request_id = request_id(&headers);
    let method_str = method.to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %uri.path(),
        message_type = ?request_message_type(uri.path()).map(|t| t.to_string()),
        "Relaying request"
    );

    let backend_state = state.backend.state();
    let response = if backend_state != BackendState::Ready {
        tracing::warn!(request_id = %request_id, state = %backend_state, "Backend not ready, rejecting request");
        RelayError::BackendUnavailable(backend_state).into_response_with_id(&request_id)
    } else {
        match body {
            Ok(body) => {
                let mut request = Request::new(body);
                *request.method_mut() = method;
                *request.uri_mut() = uri;
                *request.version_mut() = version;
                *request.headers_mut() = headers;

                match forward(&state, request, &request_id).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(request_id = %request_id, error = %e, "Relay failed");
                        e.into_response_with_id(&request_id)
                    }
                }
            }
            Err(rejection) => {
                tracing::warn!(request_id = %request_id, error = %rejection, "Failed to buffer request body");
                rejection.into_response()
            }
        }
    };

    metrics::record_request(&method_str, response.status().as_u16(), start);
    response
}

async fn forward(
    state: &RelayState,
    request: Request<Bytes>,
    request_id: &str,
) -> Result<Response, RelayError> {
    let ctx = CallContext::new(request_id, state.relay_cancel.child_token());

    state
        .chain
        .run_request(&ctx, &request)
        .await
        .map_err(RelayError::Interceptor)?;

    let upstream = upstream_request(request, &state.backend.endpoint())?;

    let response = state
        .client
        .request(upstream)
        .await
        .map_err(|e| RelayError::Upstream(e.to_string()))?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    let inspect = !state.chain.is_empty() && response_message_type(&parts.headers).is_some();
    if !inspect {
        return Ok(Response::from_parts(parts, Body::new(body)));
    }

    let mut data = Body::new(body).into_data_stream();
    let mut buffered = BytesMut::new();
    while let Some(chunk) = data.next().await {
        let chunk = chunk.map_err(|e| RelayError::Upstream(e.to_string()))?;
        if buffered.len() + chunk.len() > state.inspect_limit {
            tracing::debug!(
                request_id = %request_id,
                limit = state.inspect_limit,
                "Response too large to inspect, relaying without response interceptors"
            );
            let head = stream::iter([Ok(buffered.freeze()), Ok(chunk)]);
            return Ok(Response::from_parts(parts, Body::from_stream(head.chain(data))));
        }
        buffered.extend_from_slice(&chunk);
    }

    let view = Response::from_parts(parts, buffered.freeze());
    state.chain.run_response(&ctx, &view).await;

    let (parts, bytes) = view.into_parts();
    Ok(Response::from_parts(parts, Body::from(bytes)))
}

/// Rewrite an inbound request for the backend: same method, path, query,
/// headers and body; absolute URI on the backend authority; HTTP/1.1.
fn upstream_request(request: Request<Bytes>, authority: &str) -> Result<Request<Body>, RelayError> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    parts.uri = Uri::builder()
        .scheme("http")
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| RelayError::Upstream(e.to_string()))?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);

    Ok(Request::from_parts(parts, Body::from(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn upstream_request_targets_backend() {
        let mut request = Request::new(Bytes::from_static(b"\x82\x0a"));
        *request.method_mut() = Method::POST;
        *request.uri_mut() = "/fdo/101/msg/10?x=1".parse().unwrap();
        *request.version_mut() = Version::HTTP_2;
        request
            .headers_mut()
            .insert("content-type", HeaderValue::from_static("application/cbor"));
        request
            .headers_mut()
            .insert("connection", HeaderValue::from_static("close"));

        let upstream = upstream_request(request, "127.0.0.1:8081").unwrap();

        assert_eq!(upstream.method(), Method::POST);
        assert_eq!(upstream.uri(), "http://127.0.0.1:8081/fdo/101/msg/10?x=1");
        assert_eq!(upstream.version(), Version::HTTP_11);
        assert_eq!(upstream.headers().get("content-type").unwrap(), "application/cbor");
        assert!(upstream.headers().get("connection").is_none());
    }

    #[tokio::test]
    async fn unready_backend_is_rejected_with_request_id() {
        use crate::config::BackendConfig;
        use tower::ServiceExt;

        let backend = Arc::new(BackendSupervisor::new(&BackendConfig::default()));
        let server = ProxyServer::new(&ListenerConfig::default(), backend, InterceptorChain::empty());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/fdo/101/msg/10")
            .body(Body::from("payload"))
            .unwrap();
        let response = server.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
        let id = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn readiness_gate_precedes_body_limit() {
        use crate::config::BackendConfig;
        use tower::ServiceExt;

        let config = ListenerConfig {
            max_body_bytes: 8,
            ..ListenerConfig::default()
        };
        let backend = Arc::new(BackendSupervisor::new(&BackendConfig::default()));
        let server = ProxyServer::new(&config, backend, InterceptorChain::empty());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/fdo/101/msg/10")
            .header("content-length", "32")
            .body(Body::from(vec![0u8; 32]))
            .unwrap();
        let response = server.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn bad_authority_is_upstream_error() {
        let request = Request::new(Bytes::new());
        let err = upstream_request(request, "not a host:port").unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));
    }
}
