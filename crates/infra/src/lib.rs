//! Infrastructure layer: stores, the Pinterest client, configuration and the dispatch job.

pub mod config;
pub mod credentials;
pub mod db;
pub mod jobs;
pub mod pinterest;
pub mod queue;

pub use config::{Config, ConfigError, ExtensionConfig, PinterestConfig};
pub use credentials::{CredentialStore, InMemoryCredentialStore, PostgresCredentialStore};
pub use jobs::{DispatchJob, DispatchPolicy, DispatchRunner, JobError};
pub use pinterest::{HttpPinterestClient, PinterestApi, PinterestError};
pub use queue::{InMemoryQueueStore, Page, PostgresQueueStore, QueueStore, StatusFilter, StoreError};
