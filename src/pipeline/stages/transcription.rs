//! Transcription stage
//!
//! Turns audio attachments into transcript metadata via an external
//! [`Transcriber`]. Audio extraction and splitting happen behind that trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::PipelineStage;
use crate::{
    pipeline::{
        context::PipelineContext,
        error::{ErrorCode, PipelineError},
    },
    protocols::{chat::AudioRef, TranscriptMetadata},
};

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Transcription service error: {0}")]
    Service(String),
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioRef) -> Result<String, TranscriptionError>;
}

pub struct TranscriptionStage {
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionStage {
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl PipelineStage for TranscriptionStage {
    fn name(&self) -> &'static str {
        "Transcription"
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        ctx.messages.iter().any(|m| !m.audio_parts().is_empty())
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        let mut next = ctx.clone();

        for audio in ctx.messages.iter().flat_map(|m| m.audio_parts()) {
            match self.transcriber.transcribe(audio).await {
                Ok(text) => {
                    debug!(filename = %audio.filename, chars = text.len(), "Transcribed audio");
                    next = next.with_transcript(TranscriptMetadata::new(&audio.filename, text));
                }
                Err(err) => {
                    warn!(filename = %audio.filename, error = %err, "Transcription failed");
                    next = next.with_error(
                        PipelineError::error(
                            ErrorCode::TranscriptionFailed,
                            format!("Could not transcribe {}", audio.filename),
                        )
                        .with_metadata("filename", audio.filename.as_str())
                        .with_cause(err),
                    );
                }
            }
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::chat::{ChatMessage, ContentPart};

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(&self, audio: &AudioRef) -> Result<String, TranscriptionError> {
            if audio.filename.ends_with(".xyz") {
                return Err(TranscriptionError::UnsupportedFormat("xyz".to_string()));
            }
            Ok(format!("transcript of {}", audio.filename))
        }
    }

    fn audio_message(files: &[&str]) -> ChatMessage {
        ChatMessage::user_parts(
            files
                .iter()
                .map(|f| ContentPart::Audio {
                    audio: AudioRef {
                        filename: f.to_string(),
                        url: format!("blob://{}", f),
                    },
                })
                .collect(),
        )
    }

    #[test]
    fn test_skips_requests_without_audio() {
        let stage = TranscriptionStage::new(Arc::new(EchoTranscriber));
        let ctx = PipelineContext::new("gpt-4o", vec![ChatMessage::user("hi")]);
        assert!(!stage.should_run(&ctx));
    }

    #[tokio::test]
    async fn test_transcribes_each_audio_part() {
        let stage = TranscriptionStage::new(Arc::new(EchoTranscriber));
        let ctx = PipelineContext::new("gpt-4o", vec![audio_message(&["a.mp3", "b.wav"])]);
        assert!(stage.should_run(&ctx));

        let next = stage.execute(&ctx).await.unwrap();
        assert_eq!(next.enrichment.transcripts.len(), 2);
        assert_eq!(next.primary_transcript().unwrap().transcript, "transcript of a.mp3");
        assert!(next.primary_transcript().unwrap().processed_content.is_none());
    }

    #[tokio::test]
    async fn test_failed_transcription_is_recorded() {
        let stage = TranscriptionStage::new(Arc::new(EchoTranscriber));
        let ctx = PipelineContext::new("gpt-4o", vec![audio_message(&["bad.xyz", "ok.mp3"])]);

        let next = stage.execute(&ctx).await.unwrap();
        assert_eq!(next.enrichment.transcripts.len(), 1);
        assert_eq!(next.errors.len(), 1);
        assert_eq!(next.errors[0].code, ErrorCode::TranscriptionFailed);
        assert_eq!(next.errors[0].metadata["filename"], "bad.xyz");
        assert!(!next.has_critical_error());
    }
}
