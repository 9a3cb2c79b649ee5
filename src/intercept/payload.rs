//! Identifier extraction from FDO message payloads.
//!
//! FDO bodies are CBOR encoded. Decoding them is a separate concern: the
//! interceptors only depend on [`PayloadDecoder`], and a decoder that finds
//! nothing turns the passport features into silent no-ops.

use crate::config::IdentifierConfig;

/// Extracts identifying values from raw message bodies.
pub trait PayloadDecoder: Send + Sync {
    /// Product UUID carried by a DI.AppStart request body.
    fn product_id(&self, payload: &[u8]) -> Option<String>;

    /// Device GUID carried by a TO2.Done2 response body.
    fn device_guid(&self, payload: &[u8]) -> Option<String>;
}

/// Decoder for deployments without a CBOR decoder: never finds an identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaquePayload;

impl PayloadDecoder for OpaquePayload {
    fn product_id(&self, _payload: &[u8]) -> Option<String> {
        None
    }

    fn device_guid(&self, _payload: &[u8]) -> Option<String> {
        None
    }
}

/// Reports operator-configured identifiers for every non-empty message.
#[derive(Debug, Clone, Default)]
pub struct FixedIdentifiers {
    product_id: Option<String>,
    device_guid: Option<String>,
}

impl FixedIdentifiers {
    pub fn new(config: &IdentifierConfig) -> Self {
        Self {
            product_id: config.product_id.clone(),
            device_guid: config.device_guid.clone(),
        }
    }
}

impl PayloadDecoder for FixedIdentifiers {
    fn product_id(&self, payload: &[u8]) -> Option<String> {
        if payload.is_empty() {
            return None;
        }
        self.product_id.clone()
    }

    fn device_guid(&self, payload: &[u8]) -> Option<String> {
        if payload.is_empty() {
            return None;
        }
        self.device_guid.clone()
    }
}

/// Decoder selected by configuration.
pub fn decoder_from_config(config: &IdentifierConfig) -> std::sync::Arc<dyn PayloadDecoder> {
    if config.is_empty() {
        std::sync::Arc::new(OpaquePayload)
    } else {
        std::sync::Arc::new(FixedIdentifiers::new(config))
    }
}
