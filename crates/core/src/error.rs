use crate::types::{GuestPlatform, MemoryBackingStrategy};
use std::time::Duration;

/// Errors that can occur while configuring or driving a utility VM.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("memory backing '{strategy}' is not supported for {platform} guests")]
    UnsupportedConfiguration {
        platform: GuestPlatform,
        strategy: MemoryBackingStrategy,
    },

    #[error("failed to create utility VM '{id}': {reason}")]
    CreateFailed { id: String, reason: String },

    #[error("utility VM '{id}' failed to start: {reason}")]
    StartFailed { id: String, reason: String },

    #[error("utility VM '{id}' did not become ready within {timeout:?}")]
    StartTimeout { id: String, timeout: Duration },

    #[error("start of utility VM '{id}' was cancelled")]
    Cancelled { id: String },

    #[error("failed to close utility VM '{id}': {reason}")]
    CloseFailed { id: String, reason: String },

    #[error("cannot {operation} utility VM '{id}' in state {state}")]
    InvalidState {
        id: String,
        operation: &'static str,
        state: &'static str,
    },

    #[error("host compute service error: {0}")]
    Hypervisor(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised before any host-side allocation was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidSpec(_) | Error::UnsupportedConfiguration { .. } | Error::Config(_)
        )
    }

    /// Lifecycle phase a host-interaction error came from.
    pub fn phase(&self) -> Option<&'static str> {
        match self {
            Error::CreateFailed { .. } => Some("create"),
            Error::StartFailed { .. } | Error::StartTimeout { .. } | Error::Cancelled { .. } => {
                Some("start")
            }
            Error::CloseFailed { .. } => Some("close"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
