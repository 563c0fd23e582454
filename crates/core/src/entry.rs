//! Queue entries and their lifecycle.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{PinId, UserId};
use crate::pin::{ImageSource, NewPin};

/// Lifecycle state of a queued pin.
///
/// Transitions:
/// - Pending -> Posted (dispatch succeeded)
/// - Pending -> Pending (failed attempt, retries left)
/// - Pending -> Exhausted (failed attempt reached the retry ceiling)
/// - Pending -> PermanentError (the publishing API rejected the pin outright)
///
/// Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinState {
    /// Waiting for its scheduled time or for another attempt.
    Pending,
    /// Published; immutable from here on.
    Posted,
    /// Retry ceiling reached.
    Exhausted,
    /// Rejected in a way retrying cannot fix.
    PermanentError,
}

impl PinState {
    pub fn is_terminal(self) -> bool {
        !self.is_dispatchable()
    }

    /// Only pending entries are ever handed to the publishing API.
    pub fn is_dispatchable(self) -> bool {
        matches!(self, PinState::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PinState::Pending => "pending",
            PinState::Posted => "posted",
            PinState::Exhausted => "exhausted",
            PinState::PermanentError => "permanent_error",
        }
    }
}

impl core::fmt::Display for PinState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PinState::Pending),
            "posted" => Ok(PinState::Posted),
            "exhausted" => Ok(PinState::Exhausted),
            "permanent_error" => Ok(PinState::PermanentError),
            other => Err(DomainError::validation(format!("unknown pin state: {other}"))),
        }
    }
}

/// One scheduled unit of content awaiting publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: PinId,
    pub user_id: UserId,
    pub board_id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub link: Option<String>,
    /// Eligible for dispatch once the clock reaches this instant.
    pub scheduled_at: DateTime<Utc>,
    pub state: PinState,
    /// Set exactly once, on the transition to `Posted`.
    pub posted_at: Option<DateTime<Utc>>,
    /// Last failure description; cleared on success.
    pub error_message: Option<String>,
    /// Failed dispatch attempts so far.
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Queue a validated submission. Missing `scheduled_at` means "due now".
    pub fn new(pin: NewPin, now: DateTime<Utc>) -> Self {
        Self {
            id: PinId::new(),
            user_id: pin.user_id,
            board_id: pin.board_id,
            title: pin.title,
            description: pin.description,
            image_url: pin.image_url,
            link: pin.link,
            scheduled_at: pin.scheduled_at.unwrap_or(now),
            state: PinState::Pending,
            posted_at: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn posted(&self) -> bool {
        self.state == PinState::Posted
    }

    pub fn image_source(&self) -> ImageSource {
        ImageSource::url(self.image_url.clone())
    }

    /// Whether a dispatch run at `now` should pick this entry up.
    pub fn is_due(&self, now: DateTime<Utc>, max_retries: u32) -> bool {
        self.state.is_dispatchable() && self.scheduled_at <= now && self.retry_count < max_retries
    }

    /// Record a successful publication.
    pub fn mark_posted(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending("mark_posted")?;
        self.state = PinState::Posted;
        self.posted_at = Some(now);
        self.error_message = None;
        self.updated_at = now;
        Ok(())
    }

    /// Record a failed attempt and return the resulting state.
    ///
    /// `retry_count` always grows by exactly one.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        permanent: bool,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<PinState> {
        self.ensure_pending("record_failure")?;
        self.retry_count += 1;
        self.error_message = Some(error.into());
        self.state = if permanent {
            PinState::PermanentError
        } else if self.retry_count >= max_retries {
            PinState::Exhausted
        } else {
            PinState::Pending
        };
        self.updated_at = now;
        Ok(self.state)
    }

    /// Human-facing label for status views.
    ///
    /// `retrying` distinguishes a pending entry that has already failed at least once.
    pub fn status_label(&self) -> &'static str {
        match self.state {
            PinState::Pending if self.retry_count > 0 => "retrying",
            PinState::Pending => "pending",
            PinState::Posted => "posted",
            PinState::Exhausted => "exhausted",
            PinState::PermanentError => "failed",
        }
    }

    fn ensure_pending(&self, op: &str) -> DomainResult<()> {
        if self.state != PinState::Pending {
            return Err(DomainError::conflict(format!(
                "{op}: pin {} is {}",
                self.id, self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(now: DateTime<Utc>) -> QueueEntry {
        QueueEntry::new(
            NewPin {
                user_id: UserId::new(),
                board_id: "b1".to_string(),
                title: "t".to_string(),
                description: "d".to_string(),
                image_url: "https://img.test/1.png".to_string(),
                link: None,
                scheduled_at: Some(now - Duration::hours(1)),
            },
            now,
        )
    }

    #[test]
    fn new_entry_is_pending_and_untouched() {
        let now = Utc::now();
        let e = entry(now);
        assert_eq!(e.state, PinState::Pending);
        assert_eq!(e.retry_count, 0);
        assert!(!e.posted());
        assert!(e.posted_at.is_none());
    }

    #[test]
    fn missing_schedule_means_due_now() {
        let now = Utc::now();
        let mut pin_entry = entry(now);
        pin_entry.scheduled_at = now;
        assert!(pin_entry.is_due(now, 3));
        assert!(!pin_entry.is_due(now - Duration::seconds(1), 3));
    }

    #[test]
    fn posting_is_terminal_and_clears_error() {
        let now = Utc::now();
        let mut e = entry(now);
        e.record_failure("boom", false, 3, now).unwrap();
        e.mark_posted(now).unwrap();

        assert!(e.posted());
        assert_eq!(e.posted_at, Some(now));
        assert!(e.error_message.is_none());
        assert_eq!(e.retry_count, 1);

        assert!(matches!(e.mark_posted(now), Err(DomainError::Conflict(_))));
        assert!(matches!(
            e.record_failure("late", false, 3, now),
            Err(DomainError::Conflict(_))
        ));
        assert!(e.posted());
    }

    #[test]
    fn failures_count_up_to_exhaustion() {
        let now = Utc::now();
        let mut e = entry(now);

        assert_eq!(e.record_failure("e1", false, 3, now).unwrap(), PinState::Pending);
        assert_eq!(e.status_label(), "retrying");
        assert_eq!(e.record_failure("e2", false, 3, now).unwrap(), PinState::Pending);
        assert_eq!(e.record_failure("e3", false, 3, now).unwrap(), PinState::Exhausted);

        assert_eq!(e.retry_count, 3);
        assert_eq!(e.error_message.as_deref(), Some("e3"));
        assert!(!e.is_due(now, 3));
        assert_eq!(e.status_label(), "exhausted");
    }

    #[test]
    fn permanent_failure_still_counts_the_attempt() {
        let now = Utc::now();
        let mut e = entry(now);
        assert_eq!(
            e.record_failure("board not found", true, 3, now).unwrap(),
            PinState::PermanentError
        );
        assert_eq!(e.retry_count, 1);
        assert!(!e.is_due(now, 3));
    }

    #[test]
    fn state_round_trips_through_storage_form() {
        for s in [
            PinState::Pending,
            PinState::Posted,
            PinState::Exhausted,
            PinState::PermanentError,
        ] {
            assert_eq!(s.as_str().parse::<PinState>().unwrap(), s);
            assert_eq!(s.is_dispatchable(), !s.is_terminal());
        }
        assert!(PinState::Pending.is_dispatchable());
        assert!("bogus".parse::<PinState>().is_err());
    }
}
