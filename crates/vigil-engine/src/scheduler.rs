//! In-process run scheduler.
//!
//! Fires a full compliance run on a fixed interval. If the previous
//! scheduled run is still in flight when the interval elapses, the tick is
//! skipped rather than queued.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use vigil_core::config::SchedulerConfig;

use crate::executor::RunRegistry;

/// Starts a compliance run over the current rule set. The server's
/// implementation reloads the rule store so each scheduled run sees a fresh
/// snapshot.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn start_run(&self) -> Result<String, String>;
}

/// Interval-driven trigger for compliance runs.
pub struct Scheduler {
    config: SchedulerConfig,
    source: Arc<dyn RunSource>,
    registry: Arc<RunRegistry>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn RunSource>,
        registry: Arc<RunRegistry>,
    ) -> Self {
        Self {
            config,
            source,
            registry,
        }
    }

    /// Spawn the scheduler loop. Returns immediately; the loop runs until
    /// the shutdown channel fires. A disabled scheduler spawns nothing but
    /// still returns a handle for uniform shutdown.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.config.enabled {
                info!("Scheduler disabled");
                return;
            }
            self.run(shutdown).await;
        })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; consume it
        // so the first scheduled run happens one full period after startup.
        ticker.tick().await;

        info!(interval_secs = self.config.interval_secs, "Scheduler started");

        let mut last_run: Option<String> = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.previous_still_running(&last_run).await {
                        warn!("Previous scheduled run still in flight, skipping tick");
                        continue;
                    }
                    match self.source.start_run().await {
                        Ok(check_id) => {
                            info!(check_id = %check_id, "Scheduled compliance run started");
                            last_run = Some(check_id);
                        }
                        Err(e) => warn!(error = %e, "Scheduled run could not start"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
    }

    async fn previous_still_running(&self, last_run: &Option<String>) -> bool {
        let Some(check_id) = last_run else {
            return false;
        };
        match self.registry.get(check_id).await {
            Some(run) => !run.status.is_terminal(),
            None => false,
        }
    }
}
