//! Content analysis stage
//!
//! Detects which content categories (text, file, image, audio) the request
//! carries so later stages can decide whether they apply.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::json;

use super::PipelineStage;
use crate::{
    pipeline::{context::PipelineContext, error::PipelineError},
    protocols::chat::ContentType,
};

pub struct ContentAnalysisStage;

#[async_trait]
impl PipelineStage for ContentAnalysisStage {
    fn name(&self) -> &'static str {
        "ContentAnalysis"
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        let content_types: BTreeSet<ContentType> = ctx
            .messages
            .iter()
            .flat_map(|message| message.content_types())
            .collect();

        let summary = json!({
            "content_types": content_types,
            "message_count": ctx.messages.len(),
        });

        Ok(ctx
            .clone()
            .with_content_types(content_types)
            .with_processed("content_analysis", summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::chat::{ChatMessage, ContentPart, ImageUrl};

    #[tokio::test]
    async fn test_detects_all_content_types() {
        let ctx = PipelineContext::new(
            "gpt-4o",
            vec![
                ChatMessage::system("be brief"),
                ChatMessage::user_parts(vec![
                    ContentPart::Text {
                        text: "describe".to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "https://example.com/cat.png".to_string(),
                            detail: None,
                        },
                    },
                ]),
            ],
        );

        let next = ContentAnalysisStage.execute(&ctx).await.unwrap();
        assert_eq!(
            next.content_types,
            BTreeSet::from([ContentType::Text, ContentType::Image])
        );
        assert_eq!(
            next.processed("content_analysis").unwrap()["content_types"],
            json!(["text", "image"])
        );
        assert!(ctx.content_types.is_empty());
    }
}
