use std::sync::Arc;

use pinqueue_infra::{
    Config, CredentialStore, DispatchJob, DispatchPolicy, HttpPinterestClient,
    InMemoryCredentialStore, InMemoryQueueStore, PinterestApi, PinterestError,
    PostgresCredentialStore, PostgresQueueStore, QueueStore, StoreError, db,
};

/// Dispatch job over type-erased adapters.
pub type AppDispatchJob =
    DispatchJob<Arc<dyn QueueStore>, Arc<dyn CredentialStore>, Arc<dyn PinterestApi>>;

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub queue: Arc<dyn QueueStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub job: Arc<AppDispatchJob>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("database setup failed: {0}")]
    Store(#[from] StoreError),
    #[error("pinterest client setup failed: {0}")]
    Pinterest(#[from] PinterestError),
}

impl AppServices {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn PinterestApi>,
        policy: DispatchPolicy,
    ) -> Self {
        let job = Arc::new(DispatchJob::new(
            queue.clone(),
            credentials.clone(),
            api,
            policy,
        ));
        Self {
            queue,
            credentials,
            job,
        }
    }

    /// Non-durable wiring for dev and tests.
    pub fn in_memory(api: Arc<dyn PinterestApi>, policy: DispatchPolicy) -> Self {
        Self::new(
            InMemoryQueueStore::arc(),
            InMemoryCredentialStore::arc(),
            api,
            policy,
        )
    }
}

/// Wire stores and the Pinterest client from configuration.
///
/// `DATABASE_URL` selects Postgres (schema applied on startup); otherwise the
/// in-memory stores are used.
pub async fn build_services(config: &Config) -> Result<AppServices, ServiceError> {
    let api: Arc<dyn PinterestApi> = Arc::new(HttpPinterestClient::new(config.pinterest.clone())?);
    let policy = DispatchPolicy::default().with_call_timeout(config.pinterest.timeout);

    match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, 10).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("using postgres stores");
            Ok(AppServices::new(
                Arc::new(PostgresQueueStore::new(pool.clone())),
                Arc::new(PostgresCredentialStore::new(pool)),
                api,
                policy,
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; queue and credentials are in-memory only");
            Ok(AppServices::in_memory(api, policy))
        }
    }
}
