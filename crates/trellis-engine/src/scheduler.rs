//! Scheduler: starts runs for active workflows whose cron schedule is due.

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use trellis_protocols::error::StoreError;
use trellis_protocols::store::WorkflowStore;
use trellis_protocols::types::WorkflowDefinition;

use crate::executor::{ExecutionEngine, RunMode};
use crate::ledger::RunLedger;
use crate::schedule::parse_utc_cron;

/// Periodically checks for due workflows and launches engine runs.
///
/// Each due workflow spawns an independent task; the tick loop itself never
/// blocks on a run. The run ledger guarantees at-most-one live run per
/// workflow; a still-running previous invocation suppresses the new start.
pub struct Scheduler {
    store: Arc<dyn WorkflowStore>,
    engine: Arc<ExecutionEngine>,
    ledger: Arc<RunLedger>,
    check_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler with the default minute-granularity tick.
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        engine: Arc<ExecutionEngine>,
        ledger: Arc<RunLedger>,
    ) -> Self {
        Self {
            store,
            engine,
            ledger,
            check_interval: Duration::from_secs(60),
        }
    }

    /// Set the tick interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Run the tick loop until the shutdown channel fires.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            "scheduler started (check interval: {:?})",
            self.check_interval
        );

        let mut interval = time::interval(self.check_interval);
        // The first tick of `interval` fires immediately; anchor the window
        // to startup so workflows are not considered due retroactively.
        let mut window_start = Utc::now();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    if let Err(e) = self.check_due(window_start, now).await {
                        error!("scheduler check failed: {}", e);
                    }
                    window_start = now;
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Check for workflows due in `(since, now]` and launch them.
    ///
    /// One workflow's bad schedule or failed launch never prevents the
    /// others from running this tick.
    pub async fn check_due(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let workflows = self.store.list_active_scheduled().await?;

        for definition in workflows {
            let Some(cron_expr) = definition.trigger.cron() else {
                continue;
            };
            let schedule = match parse_utc_cron(cron_expr) {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!("workflow {} has an invalid schedule: {}", definition.id, e);
                    continue;
                }
            };

            let due = schedule
                .after(&since)
                .next()
                .map(|t| t <= now)
                .unwrap_or(false);
            if !due {
                continue;
            }

            if self.ledger.is_running(&definition.id) {
                warn!(
                    "workflow {} is due but still running; suppressing overlapping run",
                    definition.id
                );
                continue;
            }

            self.launch(definition);
        }

        Ok(())
    }

    /// Spawn an independent live run for a due workflow.
    fn launch(&self, definition: WorkflowDefinition) {
        let Some(token) = self.ledger.begin(&definition.id) else {
            // A manual run slipped in between the due-check and now.
            warn!(
                "workflow {} acquired a run between due-check and launch; suppressing",
                definition.id
            );
            return;
        };

        info!("launching scheduled run for workflow {}", definition.id);
        let engine = self.engine.clone();
        let ledger = self.ledger.clone();

        tokio::spawn(async move {
            match engine
                .execute(&definition, RunMode::Live, None, token)
                .await
            {
                Ok(run) => debug!(
                    "scheduled run {} for workflow {} finished: {:?}",
                    run.id, definition.id, run.status
                ),
                Err(e) => error!(
                    "scheduled run for workflow {} could not execute: {}",
                    definition.id, e
                ),
            }
            ledger.finish(&definition.id);
        });
    }
}
