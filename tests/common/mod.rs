//! Shared fixtures for integration tests: mock stages, scripted provider
//! streams and output collectors.

#![allow(dead_code)]

use std::{sync::atomic::Ordering, time::Duration};

use async_trait::async_trait;
use chat_pipeline_rs::{
    pipeline::{PipelineContext, PipelineError, PipelineStage},
    protocols::chat::ChatMessage,
    streaming::{CancellationFlag, ProcessedStream, ProviderError, StreamError},
};
use futures::{stream, stream::BoxStream, StreamExt};

// ============================================================================
// Mock stages
// ============================================================================

/// Sleeps before marking itself as run
pub struct SleepStage {
    pub name: &'static str,
    pub delay: Duration,
}

impl SleepStage {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self { name, delay }
    }
}

#[async_trait]
impl PipelineStage for SleepStage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        tokio::time::sleep(self.delay).await;
        Ok(ctx.clone().with_processed(ran_key(self.name), true))
    }
}

/// Records a fixed error on the context it returns
pub struct RecordErrorStage {
    pub name: &'static str,
    pub error: PipelineError,
}

#[async_trait]
impl PipelineStage for RecordErrorStage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        Ok(ctx
            .clone()
            .with_processed(ran_key(self.name), true)
            .with_error(self.error.clone()))
    }
}

pub fn ran_key(stage: &str) -> String {
    format!("ran.{}", stage)
}

pub fn stage_ran(ctx: &PipelineContext, stage: &str) -> bool {
    ctx.processed(&ran_key(stage)).is_some()
}

pub fn chat_context(model: &str, text: &str) -> PipelineContext {
    PipelineContext::new(model, vec![ChatMessage::user(text)])
}

// ============================================================================
// Scripted provider streams
// ============================================================================

/// Yields `items` in order, sleeping `delay` before each one
pub fn scripted<T: Send + 'static>(
    items: Vec<Result<T, ProviderError>>,
    delay: Duration,
) -> BoxStream<'static, Result<T, ProviderError>> {
    stream::iter(items)
        .then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        })
        .boxed()
}

/// Yields `items`, raising `flag` once `cancel_after` items have been yielded
pub fn cancelling<T: Send + 'static>(
    items: Vec<T>,
    cancel_after: usize,
    flag: CancellationFlag,
) -> BoxStream<'static, Result<T, ProviderError>> {
    stream::iter(items.into_iter().enumerate())
        .map(move |(i, item)| {
            if i + 1 >= cancel_after {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(item)
        })
        .boxed()
}

// ============================================================================
// Output collection
// ============================================================================

#[derive(Debug, Default)]
pub struct Collected {
    pub chunks: Vec<String>,
    pub error: Option<StreamError>,
}

impl Collected {
    pub fn text(&self) -> String {
        self.chunks.concat()
    }
}

pub async fn collect(mut output: ProcessedStream) -> Collected {
    let mut collected = Collected::default();
    while let Some(item) = output.next().await {
        match item {
            Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(chunk) => collected.chunks.push(chunk),
                Err(e) => panic!("output chunk is not valid UTF-8: {}", e),
            },
            Err(err) => {
                collected.error = Some(err);
                // Nothing may follow a terminal error
                assert!(output.next().await.is_none(), "item after stream error");
                break;
            }
        }
    }
    collected
}
