//! Publishing-API credentials held per user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Tokens returned by a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present only when the provider rotates refresh tokens.
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token`, in seconds.
    pub expires_in: i64,
}

/// Access credential for one user's publishing account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` means "does not expire" (or unknown), treated as valid.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Apply a refresh grant obtained at `now`.
    ///
    /// The existing refresh token is kept when the grant does not rotate it.
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> DomainResult<Self> {
        let expires_at = expiry_after(now, grant.expires_in)?;
        Ok(Self {
            user_id: self.user_id,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: Some(expires_at),
        })
    }
}

/// `now + expires_in` seconds, rejecting lifetimes outside the representable range.
pub fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> DomainResult<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| DomainError::validation(format!("expires_in out of range: {expires_in}")))
}

// Tokens are secrets; keep them out of logs.
impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
