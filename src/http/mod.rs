//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, readiness gate)
//!     → request interceptors (InterceptorChain::run_request)
//!     → request.rs (hop-by-hop filtering) → backend
//!     → response interceptors (only for recognized Message-Type)
//!     → Send to client unchanged
//!
//! Proxy-originated failures:
//!     → response.rs (503 not ready, 500 interceptor, 502 upstream)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::RelayError;
pub use server::{ProxyServer, ServeError};
