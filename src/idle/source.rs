//! Where idle seconds come from

use std::future::Future;

use thiserror::Error;

use crate::services::system::query_idle_seconds;

#[derive(Debug, Error)]
pub enum IdleError {
    #[error("failed to run idle helper {helper}: {source}")]
    Spawn {
        helper: &'static str,
        source: std::io::Error,
    },
    #[error("idle helper reported an error: {0}")]
    Helper(String),
    #[error("could not read idle time from {0:?}")]
    Parse(String),
    #[error("idle detection is not supported on this platform")]
    Unsupported,
}

/// Seconds since the user last touched keyboard or mouse
pub trait IdleSource: Send + Sync + 'static {
    fn idle_seconds(&self) -> impl Future<Output = Result<u64, IdleError>> + Send;
}

/// Idle time from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdleSource;

impl IdleSource for SystemIdleSource {
    async fn idle_seconds(&self) -> Result<u64, IdleError> {
        query_idle_seconds().await
    }
}
