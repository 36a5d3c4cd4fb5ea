//! Stream processor
//!
//! Consumes a provider's delta sequence and produces the client byte stream:
//! paced display text followed by at most one framed metadata trailer.
//!
//! Two tasks cooperate per response. The producer pulls deltas, classifies
//! them through a [`DeltaAdapter`] and forwards display text to the pacer; the
//! pacer releases buffered text at the configured speed. Only the producer
//! writes the metadata frame, and only after the pacer has drained, so the
//! frame is always the last item. The output closes when the last sender is
//! dropped, which happens exactly once.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use super::{
    error::{ProviderError, StreamError},
    pacer::{spawn_pacer, PacerExit},
    provider::{
        AnthropicAdapter, AnthropicStreamEvent, AzureAdapter, AzureChatChunk, DeltaAdapter,
        FinishedContent,
    },
};
use crate::{
    config::StreamingSpeedConfig,
    protocols::{
        citation::{merge_citations, Citation},
        metadata::{encode_metadata, StreamMetadata, TranscriptMetadata},
    },
};

pub type OutputItem = Result<Bytes, StreamError>;
pub type OutputSender = mpsc::UnboundedSender<OutputItem>;

/// Client-facing byte stream produced by the processor
pub type ProcessedStream = UnboundedReceiverStream<OutputItem>;

/// Cooperative cancellation signal shared with the caller
pub type CancellationFlag = Arc<AtomicBool>;

pub fn cancellation_flag() -> CancellationFlag {
    Arc::new(AtomicBool::new(false))
}

#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    pub cancellation: Option<CancellationFlag>,
    /// Attached to the metadata frame with its processed content filled in
    pub transcript: Option<TranscriptMetadata>,
    /// Citations gathered outside the model (e.g. web search)
    pub external_citations: Vec<Citation>,
    pub speed: StreamingSpeedConfig,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn with_transcript(mut self, transcript: TranscriptMetadata) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn with_external_citations(mut self, citations: Vec<Citation>) -> Self {
        self.external_citations = citations;
        self
    }

    pub fn with_speed(mut self, speed: StreamingSpeedConfig) -> Self {
        self.speed = speed;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Process an Azure OpenAI chunk stream
pub fn process_azure_stream<S>(deltas: S, options: StreamOptions) -> ProcessedStream
where
    S: Stream<Item = Result<AzureChatChunk, ProviderError>> + Send + 'static,
{
    process_stream(AzureAdapter, deltas, options)
}

/// Process an Anthropic message event stream
pub fn process_anthropic_stream<S>(deltas: S, options: StreamOptions) -> ProcessedStream
where
    S: Stream<Item = Result<AnthropicStreamEvent, ProviderError>> + Send + 'static,
{
    process_stream(AnthropicAdapter::default(), deltas, options)
}

/// Process any provider stream through the given adapter.
///
/// Must be called within a Tokio runtime; the work runs on spawned tasks and
/// the returned stream is ready immediately.
pub fn process_stream<A, S>(adapter: A, deltas: S, options: StreamOptions) -> ProcessedStream
where
    A: DeltaAdapter,
    S: Stream<Item = Result<A::Delta, ProviderError>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(drive(adapter, deltas, options, tx));
    UnboundedReceiverStream::new(rx)
}

enum ProducerExit {
    Completed,
    Cancelled,
    ClientGone,
    Failed(ProviderError),
}

async fn drive<A, S>(mut adapter: A, deltas: S, options: StreamOptions, output: OutputSender)
where
    A: DeltaAdapter,
    S: Stream<Item = Result<A::Delta, ProviderError>> + Send + 'static,
{
    let provider = adapter.kind();
    debug!(provider = %provider, "Stream processing started");

    let (pacer_tx, pacer) = spawn_pacer(options.speed, output.clone());
    let mut deltas = Box::pin(deltas);

    let mut text = String::new();
    let mut thinking = String::new();
    let mut provider_citations: Vec<Citation> = Vec::new();

    let exit = loop {
        if options.is_cancelled() {
            break ProducerExit::Cancelled;
        }
        if output.is_closed() {
            break ProducerExit::ClientGone;
        }

        let Some(item) = deltas.next().await else {
            break ProducerExit::Completed;
        };

        if options.is_cancelled() {
            break ProducerExit::Cancelled;
        }

        let parts = match item.and_then(|delta| adapter.extract(delta)) {
            Ok(parts) => parts,
            Err(err) => break ProducerExit::Failed(err),
        };

        if let Some(reasoning) = parts.thinking {
            thinking.push_str(&reasoning);
        }
        provider_citations.extend(parts.citations);
        if let Some(chunk) = parts.text.filter(|t| !t.is_empty()) {
            text.push_str(&chunk);
            // A send failure means the pacer saw the client leave; the next
            // iteration observes the closed output.
            let _ = pacer_tx.send(chunk);
        }
    };

    match exit {
        ProducerExit::Completed => {
            drop(pacer_tx);
            match pacer.await {
                Ok(PacerExit::Drained { chars }) => {
                    debug!(provider = %provider, chars, "Stream content drained");
                }
                Ok(PacerExit::ClientGone { chars }) => {
                    warn!(provider = %provider, chars, "Client disconnected during streaming");
                    return;
                }
                Err(join_err) => {
                    error!(provider = %provider, error = %join_err, "Pacer task failed");
                    let _ = output.send(Err(StreamError::Internal(join_err.to_string())));
                    return;
                }
            }

            if options.is_cancelled() {
                info!(provider = %provider, "Stream cancelled before metadata");
                return;
            }

            let finished = adapter.finish(&text, &thinking);
            let metadata = build_metadata(
                finished,
                provider_citations,
                options.external_citations,
                options.transcript,
            );
            match encode_metadata(&metadata) {
                Ok(Some(frame)) => {
                    let _ = output.send(Ok(Bytes::from(frame)));
                }
                Ok(None) => {}
                Err(err) => {
                    error!(provider = %provider, error = %err, "Failed to encode metadata");
                    let _ = output.send(Err(StreamError::Metadata(err.to_string())));
                }
            }
            debug!(
                provider = %provider,
                chars = text.chars().count(),
                "Stream processing finished"
            );
        }
        ProducerExit::Cancelled => {
            stop_pacer(pacer).await;
            info!(provider = %provider, chars = text.chars().count(), "Stream cancelled");
        }
        ProducerExit::ClientGone => {
            stop_pacer(pacer).await;
            warn!(provider = %provider, "Client disconnected during streaming");
        }
        ProducerExit::Failed(err) if err.is_abort() => {
            stop_pacer(pacer).await;
            info!(provider = %provider, error = %err, "Provider stream aborted");
        }
        ProducerExit::Failed(err) => {
            stop_pacer(pacer).await;
            error!(provider = %provider, error = %err, "Provider stream failed");
            let _ = output.send(Err(StreamError::Provider(err)));
        }
    }
}

async fn stop_pacer(pacer: JoinHandle<PacerExit>) {
    pacer.abort();
    let _ = pacer.await;
}

fn build_metadata(
    finished: FinishedContent,
    provider_citations: Vec<Citation>,
    external_citations: Vec<Citation>,
    transcript: Option<TranscriptMetadata>,
) -> StreamMetadata {
    let citations = merge_citations([provider_citations, external_citations]);
    StreamMetadata {
        citations: (!citations.is_empty()).then_some(citations),
        thinking: finished.thinking,
        transcript: transcript.map(|mut t| {
            t.processed_content = Some(finished.display_text);
            t
        }),
    }
}
