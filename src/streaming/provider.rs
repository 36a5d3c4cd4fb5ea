//! Provider delta adapters
//!
//! Each provider family streams a different delta shape. An adapter turns one
//! delta into the text, reasoning and citations it carries so the stream
//! processor itself stays provider agnostic.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error::ProviderError, reasoning::extract_thinking};
use crate::protocols::citation::Citation;

/// Provider family serving a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Azure OpenAI chat completions (OpenAI-style deltas)
    Azure,
    /// Anthropic messages API (typed content block events)
    Anthropic,
}

const AZURE_MODEL_PREFIXES: &[&str] = &[
    "gpt-", "o1", "o3", "o4", "azure-", "deepseek", "phi-", "llama", "mistral",
];

impl ProviderKind {
    /// Infer the provider family from a model identifier
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let model = model_id.trim().to_lowercase();
        if model.starts_with("claude") || model.starts_with("anthropic") {
            Some(ProviderKind::Anthropic)
        } else if AZURE_MODEL_PREFIXES.iter().any(|p| model.starts_with(p)) {
            Some(ProviderKind::Azure)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "azure",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" | "openai" => Ok(ProviderKind::Azure),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// What a single delta contributes to the response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaParts {
    /// Display text, forwarded to the pacer
    pub text: Option<String>,
    /// Reasoning text, accumulated but never streamed
    pub thinking: Option<String>,
    pub citations: Vec<Citation>,
}

impl DeltaParts {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self {
            thinking: Some(thinking.into()),
            ..Default::default()
        }
    }
}

/// Final display text and reasoning of a completed response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinishedContent {
    pub display_text: String,
    pub thinking: Option<String>,
}

/// Provider-specific classification of stream deltas
pub trait DeltaAdapter: Send + 'static {
    type Delta: Send + 'static;

    fn kind(&self) -> ProviderKind;

    /// Classify one delta. An `Err` terminates the stream.
    fn extract(&mut self, delta: Self::Delta) -> Result<DeltaParts, ProviderError>;

    /// Derive the final display text and reasoning from the accumulators
    fn finish(&self, text: &str, thinking: &str) -> FinishedContent;
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================================================
// Azure OpenAI
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureChatChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<AzureChoice>,
}

impl AzureChatChunk {
    /// Chunk carrying a single content delta
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            id: None,
            choices: vec![AzureChoice {
                index: 0,
                delta: AzureDelta {
                    content: Some(text.into()),
                    ..Default::default()
                },
                finish_reason: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: AzureDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// "On your data" context with grounding citations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AzureMessageContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureMessageContext {
    #[serde(default)]
    pub citations: Vec<AzureCitation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureCitation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

/// Azure deltas carry plain text with reasoning embedded inline as
/// `<think>...</think>`, which is only separated out once the response is
/// complete.
#[derive(Debug, Default)]
pub struct AzureAdapter;

impl DeltaAdapter for AzureAdapter {
    type Delta = AzureChatChunk;

    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    fn extract(&mut self, chunk: AzureChatChunk) -> Result<DeltaParts, ProviderError> {
        let mut parts = DeltaParts::default();

        for choice in chunk.choices.into_iter().filter(|c| c.index == 0) {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                parts.text.get_or_insert_with(String::new).push_str(&content);
            }
            if let Some(context) = choice.delta.context {
                parts.citations.extend(context.citations.into_iter().enumerate().map(
                    |(i, c)| {
                        let title = c.title.or_else(|| c.filepath.clone()).unwrap_or_default();
                        Citation::new(title, c.url.unwrap_or_default()).with_index(i + 1)
                    },
                ));
            }
            if choice.finish_reason.as_deref() == Some("content_filter") {
                return Err(ProviderError::Upstream(
                    "Response was blocked by the content filter".to_string(),
                ));
            }
        }

        Ok(parts)
    }

    fn finish(&self, text: &str, _thinking: &str) -> FinishedContent {
        let split = extract_thinking(text);
        FinishedContent {
            display_text: split.display_text,
            thinking: split.thinking,
        }
    }
}

// ============================================================================
// Anthropic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        #[serde(default)]
        message: Value,
    },
    ContentBlockStart {
        #[serde(default)]
        index: u32,
        content_block: AnthropicContentBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: u32,
        delta: AnthropicDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: u32,
    },
    MessageDelta {
        #[serde(default)]
        delta: Value,
    },
    MessageStop,
    Ping,
    Error {
        error: AnthropicErrorBody,
    },
    /// Event types this adapter does not know about; ignored
    #[serde(other)]
    Unknown,
}

impl AnthropicStreamEvent {
    pub fn text_delta(text: impl Into<String>) -> Self {
        AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicDelta::TextDelta { text: text.into() },
        }
    }

    pub fn thinking_delta(thinking: impl Into<String>) -> Self {
        AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicDelta::ThinkingDelta {
                thinking: thinking.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    CitationsDelta { citation: AnthropicCitation },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnthropicCitation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cited_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

/// Anthropic streams reasoning as separate thinking blocks, which are
/// accumulated on the side and never paced to the client.
#[derive(Debug, Default)]
pub struct AnthropicAdapter {
    citation_count: usize,
}

impl DeltaAdapter for AnthropicAdapter {
    type Delta = AnthropicStreamEvent;

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn extract(&mut self, event: AnthropicStreamEvent) -> Result<DeltaParts, ProviderError> {
        let parts = match event {
            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicContentBlock::Text { text } if !text.is_empty() => DeltaParts::text(text),
                AnthropicContentBlock::Thinking { thinking } if !thinking.is_empty() => {
                    DeltaParts::thinking(thinking)
                }
                _ => DeltaParts::default(),
            },
            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicDelta::TextDelta { text } if !text.is_empty() => DeltaParts::text(text),
                AnthropicDelta::ThinkingDelta { thinking } if !thinking.is_empty() => {
                    DeltaParts::thinking(thinking)
                }
                AnthropicDelta::CitationsDelta { citation } => {
                    self.citation_count += 1;
                    let title = citation
                        .title
                        .or(citation.document_title)
                        .unwrap_or_default();
                    DeltaParts {
                        citations: vec![
                            Citation::new(title, citation.url.unwrap_or_default())
                                .with_index(self.citation_count),
                        ],
                        ..Default::default()
                    }
                }
                _ => DeltaParts::default(),
            },
            AnthropicStreamEvent::Error { error } => {
                return Err(ProviderError::Upstream(format!(
                    "{}: {}",
                    error.error_type, error.message
                )));
            }
            _ => DeltaParts::default(),
        };
        Ok(parts)
    }

    fn finish(&self, text: &str, thinking: &str) -> FinishedContent {
        FinishedContent {
            display_text: text.to_string(),
            thinking: non_empty(thinking),
        }
    }
}
