//! Request context threaded through the pipeline
//!
//! A [`PipelineContext`] is a value: stages receive a shared reference and
//! return a new context built with the consuming `with_*` helpers, so a stage
//! can never mutate the record another stage (or the orchestrator) still holds.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::PipelineError;
use crate::{
    protocols::{
        chat::{ChatMessage, ContentType, Role},
        Citation, TranscriptMetadata,
    },
    streaming::ProviderKind,
};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Per-request state flowing through every stage
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub request_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub model_id: String,
    /// Provider family resolved for the model
    pub provider: Option<ProviderKind>,
    pub messages: Arc<[ChatMessage]>,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub stream: bool,
    pub web_search: bool,
    pub content_types: BTreeSet<ContentType>,
    pub processed_content: HashMap<String, Value>,
    pub enrichment: Enrichment,
    pub errors: Vec<PipelineError>,
    pub metrics: PipelineMetrics,
}

/// Optional outputs of enrichment stages
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub search: Option<SearchEnrichment>,
    pub transcripts: Vec<TranscriptMetadata>,
}

/// Search results merged into the model context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchEnrichment {
    pub query: String,
    pub citations: Vec<Citation>,
    /// Numbered source snippets handed to the model
    pub context: String,
}

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub started_at: DateTime<Utc>,
    pub stage_durations: HashMap<String, Duration>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            stage_durations: HashMap::new(),
        }
    }
}

impl PipelineContext {
    pub fn new(model_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            session_id: None,
            user_id: None,
            model_id: model_id.into(),
            provider: None,
            messages: Arc::from(messages),
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            stream: true,
            web_search: false,
            content_types: BTreeSet::new(),
            processed_content: HashMap::new(),
            enrichment: Enrichment::default(),
            errors: Vec::new(),
            metrics: PipelineMetrics::default(),
        }
    }

    // ==================== Construction ====================

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    // ==================== Stage outputs ====================

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_content_types(mut self, content_types: BTreeSet<ContentType>) -> Self {
        self.content_types = content_types;
        self
    }

    pub fn with_processed(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.processed_content.insert(key.into(), value.into());
        self
    }

    pub fn with_search_enrichment(mut self, search: SearchEnrichment) -> Self {
        self.enrichment.search = Some(search);
        self
    }

    pub fn with_transcript(mut self, transcript: TranscriptMetadata) -> Self {
        self.enrichment.transcripts.push(transcript);
        self
    }

    pub fn with_error(mut self, error: PipelineError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_stage_duration(mut self, stage: &str, duration: Duration) -> Self {
        self.metrics.stage_durations.insert(stage.to_string(), duration);
        self
    }

    // ==================== Accessors ====================

    pub fn processed(&self, key: &str) -> Option<&Value> {
        self.processed_content.get(key)
    }

    pub fn has_critical_error(&self) -> bool {
        self.errors.iter().any(PipelineError::is_critical)
    }

    pub fn first_critical_error(&self) -> Option<&PipelineError> {
        self.errors.iter().find(|e| e.is_critical())
    }

    /// Text of the most recent user message, used as the search query
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .filter(|message| message.role == Role::User)
            .find_map(|message| message.content.text())
    }

    /// First transcript attached to the request, if any
    pub fn primary_transcript(&self) -> Option<&TranscriptMetadata> {
        self.enrichment.transcripts.first()
    }

    /// Citations gathered by enrichment stages
    pub fn enrichment_citations(&self) -> Vec<Citation> {
        self.enrichment
            .search
            .as_ref()
            .map(|search| search.citations.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::ErrorCode;

    #[test]
    fn test_with_helpers_leave_original_untouched() {
        let original = PipelineContext::new("gpt-4o", vec![ChatMessage::user("hi")]);
        let next = original
            .clone()
            .with_processed("fast", true)
            .with_error(PipelineError::warning(ErrorCode::SearchFailed, "no results"));

        assert!(original.processed("fast").is_none());
        assert!(original.errors.is_empty());
        assert_eq!(next.processed("fast"), Some(&Value::Bool(true)));
        assert_eq!(next.errors.len(), 1);
        // Messages are shared, not copied
        assert!(Arc::ptr_eq(&original.messages, &next.messages));
    }

    #[test]
    fn test_last_user_text_skips_assistant_turns() {
        let ctx = PipelineContext::new(
            "gpt-4o",
            vec![
                ChatMessage::user("first question"),
                ChatMessage::assistant("answer"),
                ChatMessage::user("follow up"),
                ChatMessage::assistant("second answer"),
            ],
        );
        assert_eq!(ctx.last_user_text().as_deref(), Some("follow up"));
    }

    #[test]
    fn test_critical_error_lookup() {
        let ctx = PipelineContext::new("gpt-4o", vec![])
            .with_error(PipelineError::warning(ErrorCode::SearchFailed, "slow"))
            .with_error(PipelineError::critical(ErrorCode::AuthRequired, "login"));
        assert!(ctx.has_critical_error());
        assert_eq!(ctx.first_critical_error().unwrap().code, ErrorCode::AuthRequired);
    }
}
