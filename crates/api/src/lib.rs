//! HTTP API: cron trigger, the external pin endpoints and signed extension requests.

pub mod app;
pub mod middleware;
pub mod signature;
