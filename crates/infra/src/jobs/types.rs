//! Dispatch policy and failure taxonomy.

use std::time::Duration;

use crate::pinterest::PinterestError;
use crate::queue::StoreError;

pub const MAX_RETRIES: u32 = 3;
pub const BATCH_SIZE: usize = 10;

/// Knobs for one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Entries with this many failed attempts are never selected again.
    pub max_retries: u32,
    /// Upper bound on entries handled per run.
    pub batch_size: usize,
    /// Bound on each external call (refresh and create).
    pub call_timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            batch_size: BATCH_SIZE,
            call_timeout: Duration::from_secs(15),
        }
    }
}

impl DispatchPolicy {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Why a single entry could not be published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchFailure {
    #[error("no Pinterest access token linked for this user")]
    MissingCredential,
    #[error("Token expired and no refresh token available")]
    CredentialExpiredNoRefresh,
    #[error("token refresh failed: {0}")]
    RefreshFailure(PinterestError),
    #[error("create pin failed: {0}")]
    DispatchFailure(PinterestError),
    #[error("credential store unavailable: {0}")]
    CredentialStore(StoreError),
}

impl DispatchFailure {
    /// Retrying the same entry cannot succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            DispatchFailure::DispatchFailure(err) => err.is_permanent(),
            _ => false,
        }
    }

    /// Whether this failure consumes one of the entry's attempts.
    ///
    /// Credential-store outages say nothing about the entry, so it is left as is.
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, DispatchFailure::CredentialStore(_))
    }
}

/// Whole-batch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("queue store error: {0}")]
    Store(#[from] StoreError),
    #[error("a dispatch run is already in progress")]
    AlreadyRunning,
}
