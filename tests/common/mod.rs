//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Request, Response, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use fdo_passport_proxy::config::{BackendConfig, ListenerConfig};
use fdo_passport_proxy::intercept::{CallContext, InterceptError, Interceptor, InterceptorChain};
use fdo_passport_proxy::passport::{
    CommissioningCreateRequest, PassportClient, PassportError, PassportResult, ProductItemAgent,
    ProductItemMetadata, ProductItemPassport, ProductItemRecord,
};
use fdo_passport_proxy::{BackendSupervisor, ProxyServer, Shutdown};

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Scripted answer for one path.
#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub message_type: Option<String>,
    pub body: Bytes,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    scripts: Arc<Mutex<HashMap<String, Scripted>>>,
}

/// In-process stand-in for the FDO server.
///
/// `/health` answers 200 and is not recorded. FDO message paths answer 200
/// with `Message-Type` set to the request type + 1 and a body of
/// `reply-to-{type}`, unless a script overrides the path.
pub struct MockBackend {
    pub addr: SocketAddr,
    state: MockState,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/health", any(|| async { StatusCode::OK }))
            .route("/{*path}", any(mock_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn script(&self, path: &str, status: u16, message_type: Option<&str>, body: &'static [u8]) {
        self.state.scripts.lock().unwrap().insert(
            path.to_string(),
            Scripted {
                status,
                message_type: message_type.map(str::to_string),
                body: Bytes::from_static(body),
            },
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn mock_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        uri: uri.clone(),
        headers,
        body,
    });

    let scripted = state.scripts.lock().unwrap().get(uri.path()).cloned();
    let scripted = scripted.unwrap_or_else(|| default_reply(uri.path()));

    let mut builder = Response::builder()
        .status(scripted.status)
        .header("content-type", "application/cbor");
    if let Some(message_type) = &scripted.message_type {
        builder = builder.header("Message-Type", message_type.as_str());
    }
    builder.body(axum::body::Body::from(scripted.body)).unwrap()
}

fn default_reply(path: &str) -> Scripted {
    let msg_type = path
        .rsplit('/')
        .next()
        .and_then(|t| t.parse::<u16>().ok());

    match msg_type {
        Some(t) if path.starts_with("/fdo/") => Scripted {
            status: 200,
            message_type: Some((t + 1).to_string()),
            body: Bytes::from(format!("reply-to-{}", t)),
        },
        _ => Scripted {
            status: 200,
            message_type: None,
            body: Bytes::from_static(b"plain"),
        },
    }
}

/// Raw TCP backend: `/health` answers 200, every other request gets its
/// connection closed without a response.
pub async fn start_health_only_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]);
                        if head.starts_with("GET /health ") {
                            let _ = socket
                                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                                .await;
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A bound-then-released local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Backend config whose child is a harmless `sleep` and whose health
/// endpoint is `port` on localhost.
pub fn sleeper_backend(port: u16) -> BackendConfig {
    BackendConfig {
        program: "sleep".into(),
        args: vec!["30".into()],
        working_dir: ".".into(),
        host: "127.0.0.1".into(),
        port,
        health_path: "/health".into(),
        ready_timeout_secs: 5,
        poll_interval_ms: 20,
        probe_timeout_ms: 200,
        stop_grace_secs: 1,
    }
}

/// A running proxy plus the handles needed to drive and stop it.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub backend: Arc<BackendSupervisor>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start a proxy whose supervised backend is ready and served by `backend_port`.
pub async fn start_ready_proxy(backend_port: u16, chain: InterceptorChain) -> TestProxy {
    start_proxy_with(backend_port, chain, ListenerConfig::default(), true).await
}

/// Start a proxy whose backend was never started.
pub async fn start_unready_proxy(backend_port: u16, chain: InterceptorChain) -> TestProxy {
    start_proxy_with(backend_port, chain, ListenerConfig::default(), false).await
}

pub async fn start_proxy_with(
    backend_port: u16,
    chain: InterceptorChain,
    listener_config: ListenerConfig,
    ready: bool,
) -> TestProxy {
    let backend = Arc::new(BackendSupervisor::new(&sleeper_backend(backend_port)));
    if ready {
        backend.start().await.unwrap();
        backend.wait_ready().await.unwrap();
    }

    let server = ProxyServer::new(&listener_config, backend.clone(), chain);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let token = shutdown.token();

    let handle = tokio::spawn(async move { server.run(listener, token, Duration::from_secs(2)).await });

    TestProxy {
        addr,
        backend,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}

/// How a stub passport client answers.
#[derive(Debug, Clone, Copy)]
pub enum StubMode {
    Succeed,
    /// Answer with this HTTP status as an `UnexpectedStatus` error.
    Fail(u16),
    /// Succeed after a delay.
    Slow(Duration),
}

/// Passport client that records every call.
pub struct StubPassportClient {
    mode: StubMode,
    pub lookups: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CommissioningCreateRequest>>,
}

impl StubPassportClient {
    pub fn new(mode: StubMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            lookups: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<CommissioningCreateRequest> {
        self.created.lock().unwrap().clone()
    }

    async fn outcome(&self) -> PassportResult<()> {
        match self.mode {
            StubMode::Succeed => Ok(()),
            StubMode::Fail(status) => Err(PassportError::UnexpectedStatus {
                status,
                body: "stub failure".into(),
            }),
            StubMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PassportClient for StubPassportClient {
    async fn read_product_passport(&self, uuid: &str) -> PassportResult<ProductItemPassport> {
        self.lookups.lock().unwrap().push(uuid.to_string());
        self.outcome().await?;
        Ok(sample_passport(uuid))
    }

    async fn create_commissioning_record(
        &self,
        request: &CommissioningCreateRequest,
    ) -> PassportResult<()> {
        self.created.lock().unwrap().push(request.clone());
        self.outcome().await
    }
}

pub fn sample_passport(uuid: &str) -> ProductItemPassport {
    ProductItemPassport {
        schema_version: 1.0,
        uuid: uuid.to_string(),
        records: vec![ProductItemRecord {
            uuid: "record-1".into(),
            signature: "sig-record".into(),
            descriptor: "board assembled".into(),
        }],
        metadata: ProductItemMetadata {
            version: "1".into(),
            creation_time: "2024-01-01T00:00:00Z".into(),
            board_sn: "SN-0001".into(),
        },
        agent: ProductItemAgent {
            uuid: "agent-1".into(),
            signature: "sig-agent".into(),
        },
        signature: "sig-passport".into(),
    }
}

/// Interceptor that fails at the configured stage.
pub struct FailingInterceptor {
    pub fail_request: bool,
    pub fail_response: bool,
}

#[async_trait]
impl Interceptor for FailingInterceptor {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn process_request(
        &self,
        _ctx: &CallContext,
        _request: &Request<Bytes>,
    ) -> Result<(), InterceptError> {
        if self.fail_request {
            return Err(InterceptError::Request {
                interceptor: "failing",
                reason: "injected".into(),
            });
        }
        Ok(())
    }

    async fn process_response(
        &self,
        _ctx: &CallContext,
        _response: &Response<Bytes>,
    ) -> Result<(), InterceptError> {
        if self.fail_response {
            return Err(InterceptError::Response {
                interceptor: "failing",
                reason: "injected".into(),
            });
        }
        Ok(())
    }
}
