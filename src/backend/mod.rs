//! Supervised FDO backend.
//!
//! # Data Flow
//! ```text
//! startup::run
//!     → BackendSupervisor::start       (spawn child, Unstarted → Starting)
//!     → BackendSupervisor::wait_ready  (health polling, Starting → Ready)
//!     → relays read state() per request
//!     → BackendSupervisor::stop        (SIGTERM, grace, SIGKILL, → Stopped)
//! ```

pub mod state;
pub mod supervisor;

pub use state::BackendState;
pub use supervisor::{BackendError, BackendSupervisor};
