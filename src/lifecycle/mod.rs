//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Passport client → Interceptor chain → Backend ready → Listener bound
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain relays → Stop backend → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the listener starts last, so no traffic before readiness
//! - Shutdown has a deadline: relays still running after it are cancelled

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
