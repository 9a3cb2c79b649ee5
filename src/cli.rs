//! Command line interface.
//!
//! Flags override the optional TOML file; the merged result is validated once.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::read_config;
use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig};

#[derive(Debug, Parser)]
#[command(name = "fdo-passport-proxy")]
#[command(about = "Intercepting reverse proxy for an FDO onboarding server", long_about = None)]
pub struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<String>,

    /// Path to the go-fdo repository (backend working directory)
    #[arg(long)]
    pub fdo_path: Option<PathBuf>,

    /// Fixed local port of the backend FDO server
    #[arg(long)]
    pub backend_port: Option<u16>,

    /// Base URL for the product item passport service
    #[arg(long)]
    pub product_base_url: Option<String>,

    /// URL for commissioning passport creation
    #[arg(long)]
    pub commissioning_url: Option<String>,

    /// CA cert PEM for product passport mTLS
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Client cert PEM for product passport mTLS
    #[arg(long)]
    pub client_cert: Option<PathBuf>,

    /// Client key PEM for product passport mTLS
    #[arg(long)]
    pub client_key: Option<PathBuf>,

    /// Enable product item passport lookup during DI
    #[arg(long)]
    pub enable_product_passport: bool,

    /// Owner ID for commissioning passports (enables the TO2 interceptor)
    #[arg(long)]
    pub owner_id: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,
}

impl Cli {
    /// Load the file (if any), apply flag overrides and validate.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(path) = self.fdo_path {
            config.backend.working_dir = path;
        }
        if let Some(port) = self.backend_port {
            config.backend.port = port;
        }

        let passport = &mut config.passport;
        if let Some(url) = non_empty(self.product_base_url) {
            passport.product_base_url = Some(url);
        }
        if let Some(url) = non_empty(self.commissioning_url) {
            passport.commissioning_url = Some(url);
        }
        if self.ca_cert.is_some() {
            passport.ca_cert = self.ca_cert;
        }
        if self.client_cert.is_some() {
            passport.client_cert = self.client_cert;
        }
        if self.client_key.is_some() {
            passport.client_key = self.client_key;
        }
        if self.enable_product_passport {
            passport.enable_product_passport = true;
        }
        if let Some(owner_id) = non_empty(self.owner_id) {
            passport.owner_id = Some(owner_id);
        }

        let observability = &mut config.observability;
        if self.debug {
            observability.log_level = "debug".to_string();
        }
        if self.json_logs {
            observability.json_logs = true;
        }
        if let Some(address) = self.metrics_address {
            observability.metrics_enabled = true;
            observability.metrics_address = address;
        }
    }
}

/// Empty flag values mean "not set".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
