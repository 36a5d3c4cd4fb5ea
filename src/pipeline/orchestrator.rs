//! Pipeline orchestrator
//!
//! Runs stages strictly in order, bounding each with its own timeout and
//! deciding from the recorded error severities whether to keep going.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::{
    context::PipelineContext,
    error::{ErrorSeverity, PipelineError},
    stages::PipelineStage,
};
use crate::config::PipelineConfig;

pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RequestPipeline {
    stages: Arc<Vec<Box<dyn PipelineStage>>>,
    timeouts: Arc<HashMap<String, Duration>>,
    default_timeout: Duration,
}

impl RequestPipeline {
    pub fn new(stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self {
            stages: Arc::new(stages),
            timeouts: Arc::new(HashMap::new()),
            default_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Build a pipeline using the timeouts from configuration
    pub fn from_config(stages: Vec<Box<dyn PipelineStage>>, config: &PipelineConfig) -> Self {
        Self::new(stages)
            .with_timeouts(config.timeouts())
            .with_default_timeout(config.default_timeout())
    }

    /// Per-stage timeouts keyed by stage name
    pub fn with_timeouts(mut self, timeouts: HashMap<String, Duration>) -> Self {
        self.timeouts = Arc::new(timeouts);
        self
    }

    /// Timeout for stages absent from the timeout map
    pub fn with_default_timeout(mut self, default_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn timeout_for(&self, stage_name: &str) -> Duration {
        self.timeouts
            .get(stage_name)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Run every applicable stage over `initial` and return the final context
    ///
    /// A stage that exceeds its timeout is dropped mid-flight: its output is
    /// never applied, a `PIPELINE_TIMEOUT` warning is recorded and the next
    /// stage runs. Execution stops after the first stage that records a
    /// critical error.
    pub async fn execute(&self, initial: PipelineContext) -> PipelineContext {
        let pipeline_start = Instant::now();
        let mut ctx = initial;

        for (idx, stage) in self.stages.iter().enumerate() {
            let name = stage.name();

            if !stage.should_run(&ctx) {
                debug!(stage = name, "Skipping stage");
                continue;
            }

            let stage_timeout = self.timeout_for(name);
            let errors_before = ctx.errors.len();
            let stage_start = Instant::now();

            // Dropping the timed-out future cancels the stage, so a late
            // result can never reach the context.
            let outcome = timeout(stage_timeout, stage.execute(&ctx)).await;
            let elapsed = stage_start.elapsed();

            ctx = match outcome {
                Ok(Ok(next)) => {
                    debug!(
                        stage = name,
                        duration_ms = elapsed.as_millis() as u64,
                        "Stage completed"
                    );
                    next.with_stage_duration(name, elapsed)
                }
                Ok(Err(err)) => {
                    warn!(stage = name, error = %err, "Stage failed");
                    ctx.with_error(err)
                }
                Err(_) => {
                    warn!(
                        stage = name,
                        timeout_ms = stage_timeout.as_millis() as u64,
                        "Stage timed out"
                    );
                    ctx.with_error(PipelineError::stage_timeout(name, stage_timeout))
                }
            };

            let new_errors = ctx.errors.get(errors_before..).unwrap_or(&[]);
            for err in new_errors {
                if err.severity == ErrorSeverity::Error {
                    warn!(stage = name, code = %err.code, message = %err.message, "Stage recorded error");
                }
            }

            if let Some(critical) = new_errors.iter().find(|e| e.is_critical()) {
                error!(
                    "Stage {} ({}) raised critical error {}, halting pipeline",
                    idx + 1,
                    name,
                    critical
                );
                return ctx;
            }
        }

        debug!(
            request_id = %ctx.request_id,
            duration_ms = pipeline_start.elapsed().as_millis() as u64,
            errors = ctx.errors.len(),
            "Pipeline completed"
        );
        ctx
    }
}
