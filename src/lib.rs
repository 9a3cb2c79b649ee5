//! FDO Passport Proxy Library
//!
//! An intercepting reverse proxy that supervises an FDO onboarding server and
//! records supply-chain passports as devices move through the protocol.

pub mod backend;
pub mod cli;
pub mod config;
pub mod health;
pub mod http;
pub mod intercept;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod passport;

pub use backend::{BackendState, BackendSupervisor};
pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use intercept::{Interceptor, InterceptorChain};
pub use lifecycle::Shutdown;
pub use passport::{HttpPassportClient, PassportClient};
