//! Staged request pipeline
//!
//! A request is described by a [`PipelineContext`] which is passed through an
//! ordered list of [`PipelineStage`]s by the [`RequestPipeline`] orchestrator.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod stages;

pub use context::{Enrichment, PipelineContext, PipelineMetrics, SearchEnrichment};
pub use error::{ErrorCategory, ErrorCode, ErrorSeverity, PipelineError};
pub use orchestrator::{RequestPipeline, DEFAULT_STAGE_TIMEOUT};
pub use stages::{standard_stages, PipelineStage};
