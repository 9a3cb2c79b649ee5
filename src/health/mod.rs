//! Backend health probing.
//!
//! # Data Flow
//! ```text
//! BackendSupervisor::wait_ready
//!     → ReadinessProbe::check every poll interval
//!     → GET http://{host}:{port}{health_path}
//!     → 2xx marks the backend Ready
//! ```
//!
//! # Design Decisions
//! - Fixed poll interval, no backoff or jitter
//! - Each probe has its own timeout so a hung connect cannot eat the whole budget

pub mod readiness;

pub use readiness::ReadinessProbe;
