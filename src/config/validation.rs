//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check passport URLs and mutual TLS material consistency
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::{BackendConfig, ListenerConfig, PassportConfig, ProxyConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate the whole configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_listener(&config.listener, &mut errors);
    validate_backend(&config.backend, &mut errors);
    validate_passport(&config.passport, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_listener(listener: &ListenerConfig, errors: &mut Vec<ValidationError>) {
    if listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than 0",
        ));
    }
}

fn validate_backend(backend: &BackendConfig, errors: &mut Vec<ValidationError>) {
    if backend.program.trim().is_empty() {
        errors.push(ValidationError::new("backend.program", "must not be empty"));
    }
    if backend.host.trim().is_empty() {
        errors.push(ValidationError::new("backend.host", "must not be empty"));
    }
    if backend.port == 0 {
        errors.push(ValidationError::new("backend.port", "must be a fixed, non-zero port"));
    }
    if !backend.health_path.starts_with('/') {
        errors.push(ValidationError::new(
            "backend.health_path",
            format!("'{}' must start with '/'", backend.health_path),
        ));
    }
    if backend.ready_timeout_secs == 0 {
        errors.push(ValidationError::new("backend.ready_timeout_secs", "must be greater than 0"));
    }
    if backend.poll_interval_ms == 0 {
        errors.push(ValidationError::new("backend.poll_interval_ms", "must be greater than 0"));
    }
    if backend.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("backend.probe_timeout_ms", "must be greater than 0"));
    }
}

fn validate_passport(passport: &PassportConfig, errors: &mut Vec<ValidationError>) {
    let product_scheme = passport
        .product_base_url
        .as_deref()
        .and_then(|raw| check_url("passport.product_base_url", raw, errors));
    if let Some(raw) = passport.commissioning_url.as_deref() {
        check_url("passport.commissioning_url", raw, errors);
    }

    let triple = [
        passport.ca_cert.is_some(),
        passport.client_cert.is_some(),
        passport.client_key.is_some(),
    ];
    let complete = triple.iter().all(|present| *present);
    if passport.has_tls_material() && !complete {
        errors.push(ValidationError::new(
            "passport.ca_cert",
            "ca_cert, client_cert and client_key must be configured together",
        ));
    } else if product_scheme.as_deref() == Some("https") && !complete {
        errors.push(ValidationError::new(
            "passport.product_base_url",
            "https product lookups require ca_cert, client_cert and client_key",
        ));
    }

    if passport.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "passport.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if matches!(passport.owner_id.as_deref(), Some(id) if id.trim().is_empty()) {
        errors.push(ValidationError::new("passport.owner_id", "must not be blank when set"));
    }
}

/// Parse a service URL, returning its scheme when acceptable.
fn check_url(field: &'static str, raw: &str, errors: &mut Vec<ValidationError>) -> Option<String> {
    match url::Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            Some(url.scheme().to_string())
        }
        Ok(url) => {
            errors.push(ValidationError::new(
                field,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
            None
        }
        Err(e) => {
            errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", raw, e)));
            None
        }
    }
}
