//! Model selection stage
//!
//! Resolves which provider family serves the requested model, which in turn
//! decides the stream processor used for the response.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::PipelineStage;
use crate::{
    pipeline::{
        context::PipelineContext,
        error::{ErrorCode, PipelineError},
    },
    streaming::ProviderKind,
};

#[derive(Default)]
pub struct ModelSelectionStage {
    overrides: HashMap<String, ProviderKind>,
}

impl ModelSelectionStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a specific model id (e.g. an Azure deployment name) to a provider
    pub fn with_model(mut self, model_id: impl Into<String>, provider: ProviderKind) -> Self {
        self.overrides.insert(model_id.into(), provider);
        self
    }

    fn resolve(&self, model_id: &str) -> Option<ProviderKind> {
        self.overrides
            .get(model_id)
            .copied()
            .or_else(|| ProviderKind::from_model_id(model_id))
    }
}

#[async_trait]
impl PipelineStage for ModelSelectionStage {
    fn name(&self) -> &'static str {
        "ModelSelection"
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        match self.resolve(&ctx.model_id) {
            Some(provider) => {
                debug!(model = %ctx.model_id, provider = %provider, "Selected provider");
                Ok(ctx.clone().with_provider(provider))
            }
            None => Err(PipelineError::critical(
                ErrorCode::ModelNotFound,
                format!("No provider serves model '{}'", ctx.model_id),
            )
            .with_metadata("model", ctx.model_id.as_str())),
        }
    }
}
