//! The pin dispatch job.
//!
//! One run selects the oldest due entries (bounded by the batch size) and handles
//! them strictly one after another: resolve the owner's credential, refresh it if
//! expired, create the pin, then record the outcome. Nothing that goes wrong with a
//! single entry stops the batch; only failing to select aborts a run.

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use pinqueue_core::{DispatchReport, DispatchResult, QueueEntry};

use super::types::{DispatchFailure, DispatchPolicy, JobError};
use crate::credentials::CredentialStore;
use crate::pinterest::{CreatePinRequest, CreatedPin, PinterestApi, PinterestError};
use crate::queue::QueueStore;

pub struct DispatchJob<Q, C, P> {
    queue: Q,
    credentials: C,
    api: P,
    policy: DispatchPolicy,
    run_lock: Mutex<()>,
}

impl<Q, C, P> DispatchJob<Q, C, P>
where
    Q: QueueStore,
    C: CredentialStore,
    P: PinterestApi,
{
    pub fn new(queue: Q, credentials: C, api: P, policy: DispatchPolicy) -> Self {
        Self {
            queue,
            credentials,
            api,
            policy,
            run_lock: Mutex::new(()),
        }
    }

    /// Process one batch of due entries as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DispatchReport, JobError> {
        let _guard = self.run_lock.try_lock().map_err(|_| JobError::AlreadyRunning)?;

        let batch = self
            .queue
            .select_due(now, self.policy.max_retries, self.policy.batch_size)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to select due pins");
                JobError::Store(e)
            })?;
        let selected = batch.len();

        let mut report = DispatchReport::default();
        for entry in batch {
            let result = self.process(&entry, now).await;
            report.push(result);
        }

        info!(
            selected,
            processed = report.processed_count,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "dispatch run finished"
        );
        Ok(report)
    }

    async fn process(&self, entry: &QueueEntry, now: DateTime<Utc>) -> DispatchResult {
        match self.dispatch(entry, now).await {
            Ok(created) => self.record_posted(entry, created, now).await,
            Err(failure) => self.record_failed(entry, failure, now).await,
        }
    }

    async fn dispatch(
        &self,
        entry: &QueueEntry,
        now: DateTime<Utc>,
    ) -> Result<CreatedPin, DispatchFailure> {
        let access_token = self.access_token_for(entry, now).await?;
        let request = CreatePinRequest::from(entry);
        self.bounded(self.api.create_pin(&access_token, &request))
            .await
            .map_err(DispatchFailure::DispatchFailure)
    }

    /// A usable access token for the entry's owner, refreshed and persisted first if expired.
    async fn access_token_for(
        &self,
        entry: &QueueEntry,
        now: DateTime<Utc>,
    ) -> Result<String, DispatchFailure> {
        let credential = self
            .credentials
            .get(entry.user_id)
            .await
            .map_err(DispatchFailure::CredentialStore)?
            .filter(|c| c.has_access_token())
            .ok_or(DispatchFailure::MissingCredential)?;

        if !credential.is_expired(now) {
            return Ok(credential.access_token);
        }

        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(DispatchFailure::CredentialExpiredNoRefresh)?;
        let grant = self
            .bounded(self.api.refresh_token(refresh_token))
            .await
            .map_err(DispatchFailure::RefreshFailure)?;

        let rotated = grant.refresh_token.is_some();
        let refreshed = credential.refreshed(grant, now).map_err(|e| {
            DispatchFailure::RefreshFailure(PinterestError::Decode(e.to_string()))
        })?;
        let expires_at = refreshed.expires_at.unwrap_or(now);
        if let Err(e) = self
            .credentials
            .update_tokens(
                entry.user_id,
                &refreshed.access_token,
                expires_at,
                refreshed.refresh_token.as_deref(),
            )
            .await
        {
            // The grant is dropped; with a rotated refresh token the account may need relinking.
            error!(
                user_id = %entry.user_id,
                rotated_refresh_token = rotated,
                error = %e,
                "refreshed tokens could not be persisted"
            );
            return Err(DispatchFailure::CredentialStore(e));
        }
        debug!(user_id = %entry.user_id, %expires_at, "access token refreshed");

        Ok(refreshed.access_token)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, PinterestError>>,
    ) -> Result<T, PinterestError> {
        tokio::time::timeout(self.policy.call_timeout, call)
            .await
            .unwrap_or(Err(PinterestError::Timeout))
    }

    async fn record_posted(
        &self,
        entry: &QueueEntry,
        created: CreatedPin,
        now: DateTime<Utc>,
    ) -> DispatchResult {
        match self.queue.mark_posted(entry.id, now).await {
            Ok(()) => {
                debug!(entry_id = %entry.id, external_pin_id = %created.id, "pin posted");
                DispatchResult::posted(entry.id, created.id)
            }
            Err(e) => {
                error!(
                    entry_id = %entry.id,
                    external_pin_id = %created.id,
                    error = %e,
                    "pin was created but could not be marked posted"
                );
                DispatchResult::failed(
                    entry.id,
                    format!("created pin {} but failed to record it: {e}", created.id),
                )
            }
        }
    }

    async fn record_failed(
        &self,
        entry: &QueueEntry,
        failure: DispatchFailure,
        now: DateTime<Utc>,
    ) -> DispatchResult {
        let message = failure.to_string();
        warn!(entry_id = %entry.id, error = %message, "pin dispatch failed");

        if !failure.counts_as_attempt() {
            return DispatchResult::failed(entry.id, message);
        }

        let mut updated = entry.clone();
        let state = match updated.record_failure(
            message.clone(),
            failure.is_permanent(),
            self.policy.max_retries,
            now,
        ) {
            Ok(state) => state,
            Err(e) => {
                error!(entry_id = %entry.id, error = %e, "entry is no longer pending");
                return DispatchResult::failed(entry.id, message);
            }
        };

        if let Err(e) = self
            .queue
            .record_failure(entry.id, updated.retry_count, &message, state, now)
            .await
        {
            error!(entry_id = %entry.id, error = %e, "failed to record dispatch failure");
            return DispatchResult::failed(
                entry.id,
                format!("{message} (not recorded: {e})"),
            );
        }
        DispatchResult::failed(entry.id, message)
    }
}
