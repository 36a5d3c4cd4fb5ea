//! Streaming response processing
//!
//! Turns provider delta sequences into a paced client byte stream with an
//! optional framed metadata trailer (citations, reasoning, transcript).

pub mod error;
mod pacer;
pub mod processor;
pub mod provider;
pub mod reasoning;
pub mod response;

pub use crate::config::StreamingSpeedConfig;
pub use error::{ProviderError, StreamError};
pub use processor::{
    cancellation_flag, process_anthropic_stream, process_azure_stream, process_stream,
    CancellationFlag, ProcessedStream, StreamOptions,
};
pub use provider::{
    AnthropicAdapter, AnthropicStreamEvent, AzureAdapter, AzureChatChunk, DeltaAdapter,
    DeltaParts, FinishedContent, ProviderKind,
};
pub use reasoning::{extract_thinking, ThinkingSplit};
pub use response::into_response;
