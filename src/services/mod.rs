//! Long-running background services for `callscope run`
//!
//! Each service spawns its own tasks and listens on a shared shutdown
//! notifier. The manager starts enabled services by priority and stops them
//! in reverse order.

pub mod implementations;

pub use implementations::{AuditService, RefreshService};

use crate::config::Config;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower starts earlier and stops later
    fn priority(&self) -> i32 {
        100
    }

    fn is_enabled(&self, _config: &Config) -> bool {
        true
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String>;

    async fn stop(&mut self) -> Result<(), String> {
        Ok(())
    }
}

pub struct ServiceManager {
    services: Vec<Box<dyn Service>>,
    handles: HashMap<&'static str, Vec<JoinHandle<()>>>,
    started: Vec<&'static str>,
    shutdown: Arc<Notify>,
    config: Config,
}

impl ServiceManager {
    pub fn new(config: Config) -> Self {
        Self {
            services: Vec::new(),
            handles: HashMap::new(),
            started: Vec::new(),
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    pub fn running_services(&self) -> &[&'static str] {
        &self.started
    }

    pub async fn start_all(&mut self) -> Result<(), String> {
        self.services.sort_by_key(|s| s.priority());

        for service in self.services.iter_mut() {
            let name = service.name();
            if !service.is_enabled(&self.config) {
                logger::info(LogTag::System, &format!("Service {} disabled", name));
                continue;
            }

            let handles = service
                .start(self.shutdown.clone())
                .await
                .map_err(|e| format!("Failed to start {}: {}", name, e))?;
            self.handles.insert(name, handles);
            self.started.push(name);
            logger::info(LogTag::System, &format!("Service started: {}", name));
        }

        Ok(())
    }

    pub async fn stop_all(&mut self) {
        self.shutdown.notify_waiters();

        let order: Vec<&'static str> = self.started.drain(..).rev().collect();
        for name in order {
            if let Some(service) = self.services.iter_mut().find(|s| s.name() == name) {
                if let Err(e) = service.stop().await {
                    logger::warning(
                        LogTag::System,
                        &format!("Service stop error for {}: {}", name, e),
                    );
                }
            }

            for mut handle in self.handles.remove(name).unwrap_or_default() {
                if timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                    logger::warning(
                        LogTag::System,
                        &format!("Service {} did not stop in time, aborting", name),
                    );
                    handle.abort();
                }
            }
            logger::info(LogTag::System, &format!("Service stopped: {}", name));
        }
    }
}
