//! Passport service payloads and error definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Product item passport as returned by `GET /product_item/`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductItemPassport {
    pub schema_version: f64,
    pub uuid: String,
    pub records: Vec<ProductItemRecord>,
    pub metadata: ProductItemMetadata,
    pub agent: ProductItemAgent,
    pub signature: String,
}

/// One signed record of a product item passport, in service order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProductItemRecord {
    pub uuid: String,
    pub signature: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProductItemMetadata {
    pub version: String,
    pub creation_time: String,
    pub board_sn: String,
}

/// Agent that signed the passport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProductItemAgent {
    pub uuid: String,
    pub signature: String,
}

/// Body of the commissioning passport create call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommissioningCreateRequest {
    pub controller_uuid: String,
    pub cert: String,
    pub deployed_location: String,
    /// Nanoseconds since the Unix epoch, as a decimal string.
    pub timestamp: String,
}

impl CommissioningCreateRequest {
    /// Request for a controller commissioned at `timestamp_nanos`.
    ///
    /// Certificate and location are not extracted from the protocol yet and stay empty.
    pub fn new(controller_uuid: impl Into<String>, timestamp_nanos: u128) -> Self {
        Self {
            controller_uuid: controller_uuid.into(),
            cert: String::new(),
            deployed_location: String::new(),
            timestamp: timestamp_nanos.to_string(),
        }
    }
}

/// Errors that can occur while talking to the passport service.
#[derive(Debug, Error)]
pub enum PassportError {
    /// The endpoint needed for this call has no URL configured.
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// Configured URL could not be parsed.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Mutual TLS material could not be loaded.
    #[error("TLS material {path:?}: {reason}")]
    Tls { path: PathBuf, reason: String },

    /// Network, TLS handshake or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a status the call does not accept.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PassportError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PassportError::NotConfigured(_) => "not_configured",
            PassportError::InvalidUrl { .. } => "invalid_url",
            PassportError::Tls { .. } => "tls",
            PassportError::Transport(_) => "transport",
            PassportError::UnexpectedStatus { .. } => "unexpected_status",
            PassportError::Decode(_) => "decode",
        }
    }
}

/// Result type for passport operations.
pub type PassportResult<T> = Result<T, PassportError>;

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "schema_version": 1.0,
        "uuid": "7d3c3b7e-1111-4b7a-9a77-000000000001",
        "records": [
            {"uuid": "r-1", "signature": "sig-1", "descriptor": "board assembled"},
            {"uuid": "r-2", "signature": "sig-2", "descriptor": "firmware flashed"}
        ],
        "metadata": {"version": "2", "creation_time": "2024-05-01T10:00:00Z", "board_sn": "SN-42"},
        "agent": {"uuid": "agent-1", "signature": "agent-sig"},
        "signature": "top-sig"
    }"#;

    #[test]
    fn decodes_service_shape() {
        let passport: ProductItemPassport = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(passport.records.len(), 2);
        assert_eq!(passport.records[1].descriptor, "firmware flashed");
        assert_eq!(passport.metadata.board_sn, "SN-42");
        assert_eq!(passport.agent.uuid, "agent-1");
    }

    #[test]
    fn missing_field_is_rejected() {
        let truncated = r#"{"schema_version": 1, "uuid": "x", "records": []}"#;
        assert!(serde_json::from_str::<ProductItemPassport>(truncated).is_err());
    }

    #[test]
    fn commissioning_request_wire_shape() {
        let req = CommissioningCreateRequest::new("device-guid", 1_700_000_000_123_456_789);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "controller_uuid": "device-guid",
                "cert": "",
                "deployed_location": "",
                "timestamp": "1700000000123456789",
            })
        );
    }

    #[test]
    fn error_display() {
        let err = PassportError::UnexpectedStatus {
            status: 503,
            body: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "unexpected status 503: maintenance");
        assert_eq!(err.kind(), "unexpected_status");
        assert_eq!(
            PassportError::NotConfigured("product base URL").to_string(),
            "product base URL not configured"
        );
    }
}
