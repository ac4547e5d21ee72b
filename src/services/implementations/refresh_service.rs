use crate::config::Config;
use crate::refresh::RefreshLoop;
use crate::services::Service;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Keeps ATHs current from live prices once the backfill has completed
pub struct RefreshService {
    refresh: Arc<RefreshLoop>,
    interval: Duration,
}

impl RefreshService {
    pub fn new(refresh: Arc<RefreshLoop>, interval: Duration) -> Self {
        Self { refresh, interval }
    }
}

#[async_trait]
impl Service for RefreshService {
    fn name(&self) -> &'static str {
        "refresh"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.refresh.enabled
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let refresh = self.refresh.clone();
        let interval = self.interval.max(Duration::from_secs(1));
        Ok(vec![tokio::spawn(refresh.run(interval, shutdown))])
    }
}
