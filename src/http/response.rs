//! Relay error responses.
//!
//! Every failure the proxy itself produces maps to one status code here.
//! Backend responses never pass through this module.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::backend::BackendState;
use crate::http::request::X_REQUEST_ID;
use crate::intercept::InterceptError;

/// Errors the relay handler can produce.
#[derive(Debug)]
pub enum RelayError {
    /// Backend is not Ready; the request was not forwarded.
    BackendUnavailable(BackendState),
    /// A request-stage interceptor failed; the request was not forwarded.
    Interceptor(InterceptError),
    /// Backend could not be reached or its response could not be read.
    Upstream(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Interceptor(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Response carrying the status, a short text body and the request id.
    pub fn into_response_with_id(self, request_id: &str) -> Response {
        let mut response = self.into_response();
        if let Ok(value) = HeaderValue::from_str(request_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendUnavailable(state) => write!(f, "Backend is {}", state),
            Self::Interceptor(e) => write!(f, "Request interceptor failed: {}", e),
            Self::Upstream(e) => write!(f, "Upstream request failed: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Interceptor details stay in the logs.
        let body = match &self {
            Self::BackendUnavailable(_) => "Backend not ready",
            Self::Interceptor(_) => "Internal Server Error",
            Self::Upstream(_) => "Bad Gateway",
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
    }
}
