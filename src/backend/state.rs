//! Backend lifecycle state.
//!
//! # State Transitions
//! ```text
//! Unstarted → Starting: start() spawned the child
//! Starting  → Ready:    health endpoint answered 2xx
//! any       → Stopped:  stop(), or the child exited before becoming ready
//! ```

/// Backend State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Unstarted = 0,
    Starting = 1,
    Ready = 2,
    Stopped = 3,
}

impl From<u8> for BackendState {
    fn from(val: u8) -> Self {
        match val {
            1 => BackendState::Starting,
            2 => BackendState::Ready,
            3 => BackendState::Stopped,
            _ => BackendState::Unstarted,
        }
    }
}

impl std::fmt::Display for BackendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendState::Unstarted => "unstarted",
            BackendState::Starting => "starting",
            BackendState::Ready => "ready",
            BackendState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
