//! Chat request flow
//!
//! Runs the request pipeline, opens the model stream for the enriched
//! context and hands it to the stream processor matching the provider.

use std::sync::{atomic::Ordering, Arc};

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::BoxStream;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::{
    config::StreamingSpeedConfig,
    pipeline::{ErrorCategory, PipelineContext, PipelineError, RequestPipeline},
    streaming::{
        process_anthropic_stream, process_azure_stream, AnthropicStreamEvent, AzureChatChunk,
        CancellationFlag, ProcessedStream, ProviderError, ProviderKind, StreamOptions,
    },
};

/// Open delta stream from a model provider
pub enum ModelStream {
    Azure(BoxStream<'static, Result<AzureChatChunk, ProviderError>>),
    Anthropic(BoxStream<'static, Result<AnthropicStreamEvent, ProviderError>>),
}

impl ModelStream {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ModelStream::Azure(_) => ProviderKind::Azure,
            ModelStream::Anthropic(_) => ProviderKind::Anthropic,
        }
    }
}

/// Client able to start a streaming chat completion
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn stream_chat(&self, ctx: &PipelineContext) -> Result<ModelStream, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Pipeline(PipelineError),

    #[error("Model request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Request was cancelled")]
    Cancelled,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Pipeline(err) => StatusCode::from_u16(err.code.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            // Client closed request
            ServiceError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ServiceError::Pipeline(err) => match err.code.category() {
                ErrorCategory::Auth => "authentication_error",
                ErrorCategory::RateLimit => "rate_limit_error",
                ErrorCategory::Validation => "invalid_request_error",
                ErrorCategory::Model => "model_error",
                _ => "internal_error",
            },
            ServiceError::Provider(_) => "upstream_error",
            ServiceError::Cancelled => "request_cancelled",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ServiceError::Pipeline(err) => err.code.as_str(),
            ServiceError::Provider(_) => "EXTERNAL_SERVICE_ERROR",
            ServiceError::Cancelled => "REQUEST_CANCELLED",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), "{}", self);
        } else {
            warn!(code = self.code(), "{}", self);
        }
        let message = match &self {
            ServiceError::Pipeline(err) => err.message.clone(),
            other => other.to_string(),
        };
        (
            status,
            Json(json!({
                "error": {
                    "message": message,
                    "type": self.error_type(),
                    "code": self.code()
                }
            })),
        )
            .into_response()
    }
}

pub struct ChatService {
    pipeline: RequestPipeline,
    client: Arc<dyn ModelClient>,
    speed: StreamingSpeedConfig,
}

impl ChatService {
    pub fn new(pipeline: RequestPipeline, client: Arc<dyn ModelClient>) -> Self {
        Self {
            pipeline,
            client,
            speed: StreamingSpeedConfig::default(),
        }
    }

    pub fn with_speed(mut self, speed: StreamingSpeedConfig) -> Self {
        self.speed = speed;
        self
    }

    /// Process one chat request into a paced response stream
    pub async fn respond(
        &self,
        ctx: PipelineContext,
        cancellation: CancellationFlag,
    ) -> Result<ProcessedStream, ServiceError> {
        let ctx = self.pipeline.execute(ctx).await;

        if let Some(critical) = ctx.first_critical_error() {
            return Err(ServiceError::Pipeline(critical.clone()));
        }
        if cancellation.load(Ordering::SeqCst) {
            return Err(ServiceError::Cancelled);
        }

        let stream = self.client.stream_chat(&ctx).await?;
        if let Some(selected) = ctx.provider {
            if selected != stream.provider() {
                warn!(
                    selected = %selected,
                    actual = %stream.provider(),
                    "Model client returned a stream for a different provider"
                );
            }
        }

        let mut options = StreamOptions::new()
            .with_cancellation(cancellation)
            .with_speed(self.speed)
            .with_external_citations(ctx.enrichment_citations());
        if let Some(transcript) = ctx.primary_transcript() {
            options = options.with_transcript(transcript.clone());
        }

        debug!(
            request_id = %ctx.request_id,
            provider = %stream.provider(),
            warnings = ctx.errors.len(),
            "Streaming model response"
        );

        Ok(match stream {
            ModelStream::Azure(deltas) => process_azure_stream(deltas, options),
            ModelStream::Anthropic(deltas) => process_anthropic_stream(deltas, options),
        })
    }
}
