//! Validation stage
//!
//! This stage:
//! - Rejects requests without messages or without a model id
//! - Clamps out-of-range temperatures (recorded as a warning)

use async_trait::async_trait;
use tracing::debug;

use super::PipelineStage;
use crate::pipeline::{
    context::PipelineContext,
    error::{ErrorCode, PipelineError},
};

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

pub struct ValidationStage;

#[async_trait]
impl PipelineStage for ValidationStage {
    fn name(&self) -> &'static str {
        "Validation"
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        if ctx.messages.is_empty() {
            return Err(PipelineError::critical(
                ErrorCode::ValidationError,
                "Request must contain at least one message",
            ));
        }

        if ctx.model_id.trim().is_empty() {
            return Err(PipelineError::critical(
                ErrorCode::ModelNotFound,
                "Model parameter is required and cannot be empty",
            ));
        }

        let mut next = ctx.clone();
        let temperature = ctx.temperature;
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) || temperature.is_nan() {
            let clamped = if temperature.is_nan() {
                crate::pipeline::context::DEFAULT_TEMPERATURE
            } else {
                temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
            };
            debug!(temperature, clamped, "Clamping temperature");
            next = next.with_temperature(clamped).with_error(
                PipelineError::warning(
                    ErrorCode::InvalidParameter,
                    format!(
                        "Temperature {} outside [{}, {}], using {}",
                        temperature, MIN_TEMPERATURE, MAX_TEMPERATURE, clamped
                    ),
                )
                .with_metadata("parameter", "temperature"),
            );
        }

        Ok(next)
    }
}
