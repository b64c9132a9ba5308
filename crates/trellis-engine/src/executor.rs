//! Workflow execution engine: walks the step graph for one run.

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trellis_protocols::error::{EngineError, StepInvocationError};
use trellis_protocols::event::{NotificationType, StreamEvent};
use trellis_protocols::invoker::{InvocationOutcome, StepInvocation, StepInvoker};
use trellis_protocols::observer::{NullObserver, RunObserver};
use trellis_protocols::store::RunStore;
use trellis_protocols::types::{
    RunContext, RunStatus, WorkflowDefinition, WorkflowRun, WorkflowStep,
};

use crate::condition;
use crate::store::MemoryRunStore;

/// Execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Ad hoc run surfaced directly to the caller; not persisted as history.
    Test,
    /// Scheduler- or trigger-started run; persisted and notified.
    Live,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout applied around each step invocation.
    pub step_timeout: Duration,
    /// Ceiling on total step executions per run, the cyclic-graph guard.
    pub max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(300),
            max_steps: 100,
        }
    }
}

/// Executes one workflow run at a time: strictly sequential steps, the
/// invocation being the only suspension point. Multiple runs execute
/// concurrently as independent tasks over a shared engine.
pub struct ExecutionEngine {
    invoker: Arc<dyn StepInvoker>,
    run_store: Arc<dyn RunStore>,
    observer: Arc<dyn RunObserver>,
    config: EngineConfig,
}

impl ExecutionEngine {
    /// Create an engine with an in-memory run store and no observer.
    pub fn new(invoker: Arc<dyn StepInvoker>) -> Self {
        Self {
            invoker,
            run_store: Arc::new(MemoryRunStore::new()),
            observer: Arc::new(NullObserver),
            config: EngineConfig::default(),
        }
    }

    /// Use a specific run store.
    pub fn with_run_store(mut self, run_store: Arc<dyn RunStore>) -> Self {
        self.run_store = run_store;
        self
    }

    /// Attach a status event observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the tuning knobs.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute one run of `definition`.
    ///
    /// Step-level failures are folded into the run record and routed down
    /// failure edges; only missing entry steps and store failures surface
    /// as `Err`. Cancellation is cooperative: the flag is checked between
    /// steps, and an in-flight invocation is awaited but its result
    /// discarded.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        mode: RunMode,
        trigger_output: Option<serde_json::Value>,
        cancel: CancellationToken,
    ) -> Result<WorkflowRun, EngineError> {
        let mut run = WorkflowRun::new(&definition.id, definition.version);
        if definition.entry_step().is_none() {
            return Err(EngineError::NoEntryStep(definition.id.clone()));
        }

        info!(
            "starting {} run {} for workflow {} (v{})",
            match mode {
                RunMode::Test => "test",
                RunMode::Live => "live",
            },
            run.id,
            definition.id,
            definition.version
        );

        run.start();
        if mode == RunMode::Live {
            self.run_store.save(&run).await?;
        }
        self.emit(
            StreamEvent::status(
                &definition.id,
                match mode {
                    RunMode::Test => NotificationType::TestStarted,
                    RunMode::Live => NotificationType::ExecutionStarted,
                },
            )
            .with_run(run.id),
        );

        let mut context = match trigger_output {
            Some(output) => RunContext::new().with_trigger_output(output),
            None => RunContext::new(),
        };

        let mut current = definition.entry_step();
        let mut executed = 0usize;

        while let Some(step) = current {
            if cancel.is_cancelled() {
                info!("run {} cancelled before step {}", run.id, step.id);
                run.cancel();
                break;
            }

            executed += 1;
            if executed > self.config.max_steps {
                let limit_error = EngineError::StepLimitExceeded {
                    run_id: run.id,
                    limit: self.config.max_steps,
                };
                error!("run {}: {}", run.id, limit_error);
                run.fail(limit_error.to_string());
                break;
            }

            current = self
                .execute_step(definition, step, &mut run, &mut context, &cancel)
                .await;
        }

        if !run.status.is_terminal() {
            run.complete();
        }

        match run.status {
            RunStatus::Completed => {
                info!("run {} completed ({} steps)", run.id, run.steps.len());
                self.emit(
                    StreamEvent::status(&definition.id, NotificationType::ExecutionCompleted)
                        .with_run(run.id),
                );
            }
            RunStatus::Failed => {
                let error = run.error.clone().unwrap_or_default();
                warn!("run {} failed: {}", run.id, error);
                self.emit(
                    StreamEvent::status(&definition.id, NotificationType::ExecutionFailed)
                        .with_run(run.id)
                        .with_error(error),
                );
            }
            _ => {}
        }
        self.observer.run_finished(run.id);

        if mode == RunMode::Live {
            self.run_store.save(&run).await?;
        }
        Ok(run)
    }

    /// Execute a single step and return the next step to run, if any.
    ///
    /// Terminal transitions (run failed, run cancelled) are applied to
    /// `run` before returning `None`.
    async fn execute_step<'a>(
        &self,
        definition: &'a WorkflowDefinition,
        step: &'a WorkflowStep,
        run: &mut WorkflowRun,
        context: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Option<&'a WorkflowStep> {
        debug!("run {}: executing step {} ({})", run.id, step.id, step.name);
        run.current_step_id = Some(step.id.clone());
        let record = run.push_step(&step.id);
        run.steps[record].start();
        self.emit(
            StreamEvent::status(&definition.id, NotificationType::StepStarted)
                .with_run(run.id)
                .with_step(&step.id, &step.name),
        );

        let invocation = StepInvocation {
            instruction: step.instruction.clone(),
            agent_id: step.agent_id.clone(),
            context: context.as_value(),
        };
        let outcome =
            match tokio::time::timeout(self.config.step_timeout, self.invoker.invoke(invocation))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(StepInvocationError::Timeout {
                    agent_id: step.agent_id.clone(),
                    seconds: self.config.step_timeout.as_secs(),
                }),
            };

        if cancel.is_cancelled() {
            // The in-flight invocation was allowed to finish; its result is
            // discarded rather than applied.
            info!("run {} cancelled during step {}", run.id, step.id);
            run.cancel();
            return None;
        }

        let failure = match outcome {
            Ok(InvocationOutcome {
                success: true,
                result,
                ..
            }) => {
                run.steps[record].complete(result.clone());
                context.record_step(
                    &step.id,
                    serde_json::json!({
                        "success": true,
                        "name": step.name,
                        "result": result,
                    }),
                );
                self.emit(
                    StreamEvent::status(&definition.id, NotificationType::StepCompleted)
                        .with_run(run.id)
                        .with_step(&step.id, &step.name),
                );

                match &step.condition {
                    None => return self.next_step(definition, run, step, &step.on_success),
                    Some(expression) => match condition::evaluate(expression, context) {
                        Ok(true) => {
                            return self.next_step(definition, run, step, &step.on_success)
                        }
                        Ok(false) => {
                            // Guarded failure: the action succeeded but the
                            // post-condition routed it down the failure edge.
                            debug!(
                                "run {}: step {} post-condition not satisfied",
                                run.id, step.id
                            );
                            let message = format!("post-condition not satisfied: {expression}");
                            run.steps[record].fail(&message);
                            message
                        }
                        Err(e) => {
                            run.steps[record].fail(e.to_string());
                            e.to_string()
                        }
                    },
                }
            }
            Ok(InvocationOutcome { error, .. }) => {
                let message = error.unwrap_or_else(|| "step reported failure".to_string());
                run.steps[record].fail(&message);
                message
            }
            Err(e) => {
                let message = e.to_string();
                run.steps[record].fail(&message);
                message
            }
        };

        // Failure path: record context, notify, branch.
        warn!("run {}: step {} failed: {}", run.id, step.id, failure);
        context.record_step(
            &step.id,
            serde_json::json!({
                "success": false,
                "name": step.name,
                "error": failure,
            }),
        );
        self.emit(
            StreamEvent::status(&definition.id, NotificationType::StepFailed)
                .with_run(run.id)
                .with_step(&step.id, &step.name)
                .with_error(&failure),
        );

        match self.next_step(definition, run, step, &step.on_failure) {
            Some(next) => Some(next),
            None => {
                run.fail(failure);
                None
            }
        }
    }

    /// Resolve an edge to the next step.
    ///
    /// A dangling reference is treated as "no next step" rather than an
    /// error; save-time validation keeps new definitions from containing
    /// one.
    fn next_step<'a>(
        &self,
        definition: &'a WorkflowDefinition,
        run: &WorkflowRun,
        from: &WorkflowStep,
        edge: &Option<String>,
    ) -> Option<&'a WorkflowStep> {
        let target = edge.as_deref()?;
        let next = definition.step(target);
        if next.is_none() {
            warn!(
                "run {}: step {} references unknown step {}, ending branch",
                run.id, from.id, target
            );
        }
        next
    }

    fn emit(&self, event: StreamEvent) {
        self.observer.observe(event);
    }
}
