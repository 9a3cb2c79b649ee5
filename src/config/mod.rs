//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs overrides (flags win over the file)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → sub-structures passed by reference into each component constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::BackendConfig;
pub use schema::IdentifierConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::PassportConfig;
pub use schema::ProxyConfig;
pub use schema::ShutdownConfig;
