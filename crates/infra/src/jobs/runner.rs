//! In-process periodic trigger for the dispatch job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::dispatch::DispatchJob;
use super::types::JobError;
use crate::credentials::CredentialStore;
use crate::pinterest::PinterestApi;
use crate::queue::QueueStore;

/// Handle to control a running dispatch loop.
#[derive(Debug)]
pub struct DispatchRunnerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatchRunnerHandle {
    /// Stop the loop and wait for an in-flight run to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "dispatch runner task failed");
        }
    }
}

pub struct DispatchRunner;

impl DispatchRunner {
    /// Run `job` every `interval`, starting immediately.
    pub fn spawn<Q, C, P>(job: Arc<DispatchJob<Q, C, P>>, interval: Duration) -> DispatchRunnerHandle
    where
        Q: QueueStore + 'static,
        C: CredentialStore + 'static,
        P: PinterestApi + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "dispatch runner started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                match job.run(Utc::now()).await {
                    Ok(_) => {}
                    Err(JobError::AlreadyRunning) => {
                        warn!("previous dispatch run still in progress; skipping tick");
                    }
                    Err(e) => error!(error = %e, "dispatch run failed"),
                }
            }
            info!("dispatch runner stopped");
        });
        DispatchRunnerHandle { shutdown, join }
    }
}
