//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, ListenerError)
//!     → connection.rs (in-flight relay tracking for drain)
//!     → Hand off to HTTP layer
//!
//! Outbound passport lookups
//!     → tls.rs (client identity + pinned CA)
//! ```
//!
//! # Design Decisions
//! - The listener is bound only after the backend is ready
//! - Each relay is tracked so shutdown can report what it is waiting on

pub mod connection;
pub mod listener;
pub mod tls;
