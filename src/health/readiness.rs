//! Readiness probing against the backend health endpoint.

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

pub struct ReadinessProbe {
    client: Client<HttpConnector, Body>,
    url: String,
    timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(authority: &str, health_path: &str, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            url: format!("http://{}{}", authority, health_path),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One probe. Healthy means a 2xx answer within the probe timeout.
    pub async fn check(&self) -> bool {
        let request = match Request::builder()
            .method("GET")
            .uri(&self.url)
            .header("user-agent", "fdo-passport-proxy-readiness")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(url = %self.url, "Failed to build readiness request: {}", e);
                return false;
            }
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(url = %self.url, status = %response.status(), "Backend not ready: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::trace!(url = %self.url, error = %e, "Backend not ready: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(url = %self.url, "Backend not ready: probe timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve(status: StatusCode) -> String {
        let app = Router::new().route("/health", get(move || async move { status }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn healthy_on_2xx() {
        let authority = serve(StatusCode::OK).await;
        let probe = ReadinessProbe::new(&authority, "/health", Duration::from_secs(1));
        assert!(probe.check().await);
    }

    #[tokio::test]
    async fn unhealthy_on_error_status() {
        let authority = serve(StatusCode::SERVICE_UNAVAILABLE).await;
        let probe = ReadinessProbe::new(&authority, "/health", Duration::from_secs(1));
        assert!(!probe.check().await);
    }

    #[tokio::test]
    async fn unhealthy_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let authority = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = ReadinessProbe::new(&authority, "/health", Duration::from_millis(500));
        assert_eq!(probe.url(), format!("http://{}/health", authority));
        assert!(!probe.check().await);
    }
}
