//! `pinqueue-core` — domain building blocks for scheduled pin publishing.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! queue entries and their state machine, account credentials, pin
//! submission validation, and the report produced by a dispatch run.

pub mod credential;
pub mod entry;
pub mod error;
pub mod id;
pub mod pin;
pub mod report;

pub use credential::{expiry_after, Credential, TokenGrant};
pub use entry::{PinState, QueueEntry};
pub use error::{DomainError, DomainResult};
pub use id::{PinId, UserId};
pub use pin::{ImageSource, NewPin, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};
pub use report::{DispatchReport, DispatchResult};
