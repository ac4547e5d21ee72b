use crate::config::Config;
use crate::logger::{self, LogTag};
use crate::services::Service;
use crate::validator::Validator;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::{spawn_blocking, JoinHandle};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Periodic consistency audit, repairing fixable rows when configured
pub struct AuditService {
    validator: Arc<Validator>,
    period: Duration,
    auto_fix: bool,
}

impl AuditService {
    pub fn new(validator: Arc<Validator>, period: Duration, auto_fix: bool) -> Self {
        Self {
            validator,
            period,
            auto_fix,
        }
    }
}

#[async_trait]
impl Service for AuditService {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.validator.audit_interval_secs > 0
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let validator = self.validator.clone();
        let auto_fix = self.auto_fix;
        let mut ticker = interval(self.period.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let handle = tokio::spawn(async move {
            let stopped = shutdown.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let validator = validator.clone();
                        let audit = spawn_blocking(move || validator.validate(auto_fix));
                        match audit.await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => {
                                logger::error(LogTag::Validator, &format!("Audit failed: {}", e));
                            }
                            Err(e) => {
                                logger::error(LogTag::Validator, &format!("Audit task panicked: {}", e));
                            }
                        }
                    }
                }
            }
        });

        Ok(vec![handle])
    }
}
