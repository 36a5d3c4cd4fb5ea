//! Pipeline stages
//!
//! Each stage implements [`PipelineStage`]: a run predicate plus an async
//! transform from one context value to the next. Stages hold no per-request
//! state and never keep the context they were handed.

use std::sync::Arc;

use async_trait::async_trait;

use super::{context::PipelineContext, error::PipelineError};

// ============================================================================
// Pipeline Stage Trait
// ============================================================================

#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name, used for timeout lookup and logging
    fn name(&self) -> &'static str;

    /// Whether this stage applies to the given context
    fn should_run(&self, _ctx: &PipelineContext) -> bool {
        true
    }

    /// Produce the next context from `ctx`
    ///
    /// Returns:
    /// - `Ok(next)` - the new context, possibly carrying recorded errors
    /// - `Err(error)` - the stage failed as a whole; the orchestrator records
    ///   `error` on the unchanged input context
    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError>;
}

// ============================================================================
// Stage Modules
// ============================================================================

mod content_analysis;
mod function;
mod model_selection;
mod search;
mod transcription;
mod validation;

pub use content_analysis::ContentAnalysisStage;
pub use function::FnStage;
pub use model_selection::ModelSelectionStage;
pub use search::{SearchEnrichmentStage, SearchError, SearchProvider, SearchResult};
pub use transcription::{TranscriptionError, Transcriber, TranscriptionStage};
pub use validation::ValidationStage;

/// The standard chat request stages, in execution order
///
/// Transcription and search enrichment are only included when their
/// collaborator is available.
pub fn standard_stages(
    transcriber: Option<Arc<dyn Transcriber>>,
    search: Option<Arc<dyn SearchProvider>>,
) -> Vec<Box<dyn PipelineStage>> {
    let mut stages: Vec<Box<dyn PipelineStage>> =
        vec![Box::new(ValidationStage), Box::new(ContentAnalysisStage)];
    if let Some(transcriber) = transcriber {
        stages.push(Box::new(TranscriptionStage::new(transcriber)));
    }
    if let Some(search) = search {
        stages.push(Box::new(SearchEnrichmentStage::new(search)));
    }
    stages.push(Box::new(ModelSelectionStage::new()));
    stages
}
