//! In-band metadata framing for streamed chat responses
//!
//! A response body is plain display text optionally followed by a single
//! metadata frame:
//!
//! ```text
//! <display text><<<METADATA_START>>>{"citations":[...],"thinking":"..."}<<<METADATA_END>>>
//! ```
//!
//! The frame is always the last thing written, so everything before the start
//! marker is complete display text. Older clients may still receive a bare
//! trailing JSON object without markers; [`decode_message`] accepts both forms
//! while [`encode_metadata`] only ever produces the marker form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::citation::Citation;

pub const METADATA_START_MARKER: &str = "<<<METADATA_START>>>";
pub const METADATA_END_MARKER: &str = "<<<METADATA_END>>>";

/// Keys that identify a legacy trailing metadata object
const METADATA_KEYS: &[&str] = &["citations", "thinking", "transcript"];

/// Transcript information for audio/video derived input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMetadata {
    pub filename: String,
    pub transcript: String,
    /// Filled in once the model has finished responding about the transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_content: Option<String>,
}

impl TranscriptMetadata {
    pub fn new(filename: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            transcript: transcript.into(),
            processed_content: None,
        }
    }
}

/// Structured payload carried in the metadata frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptMetadata>,
}

impl StreamMetadata {
    pub fn is_empty(&self) -> bool {
        self.citations.is_none() && self.thinking.is_none() && self.transcript.is_none()
    }
}

/// Encode a metadata frame, or `None` when there is nothing to send.
pub fn encode_metadata(metadata: &StreamMetadata) -> Result<Option<String>, serde_json::Error> {
    if metadata.is_empty() {
        return Ok(None);
    }
    let json = serde_json::to_string(metadata)?;
    Ok(Some(format!(
        "{}{}{}",
        METADATA_START_MARKER, json, METADATA_END_MARKER
    )))
}

/// A received response split into display text and metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    pub content: String,
    pub metadata: Option<StreamMetadata>,
}

impl DecodedMessage {
    fn plain(text: &str) -> Self {
        Self {
            content: text.to_string(),
            metadata: None,
        }
    }
}

/// Split a fully received response into display text and metadata.
///
/// Never fails: malformed frames degrade to plain display text.
pub fn decode_message(text: &str) -> DecodedMessage {
    if let Some(start) = text.find(METADATA_START_MARKER) {
        return decode_marked(text, start);
    }
    decode_legacy(text).unwrap_or_else(|| DecodedMessage::plain(text))
}

fn decode_marked(text: &str, start: usize) -> DecodedMessage {
    let payload_start = start + METADATA_START_MARKER.len();
    let rest = &text[payload_start..];
    let payload = match rest.find(METADATA_END_MARKER) {
        Some(end) => &rest[..end],
        None => rest,
    };

    match serde_json::from_str::<StreamMetadata>(payload) {
        Ok(metadata) => DecodedMessage {
            content: text[..start].to_string(),
            metadata: Some(metadata),
        },
        Err(err) => {
            debug!(error = %err, "Failed to parse metadata frame, treating as plain text");
            DecodedMessage::plain(text)
        }
    }
}

/// Recognise a bare JSON object appended to the end of the text.
fn decode_legacy(text: &str) -> Option<DecodedMessage> {
    if !text.trim_end().ends_with('}') {
        return None;
    }

    for (idx, _) in text.match_indices('{') {
        let candidate = &text[idx..];
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        if !METADATA_KEYS.iter().any(|key| map.contains_key(*key)) {
            continue;
        }
        let Ok(metadata) = serde_json::from_value::<StreamMetadata>(Value::Object(map)) else {
            continue;
        };
        return Some(DecodedMessage {
            content: text[..idx].trim_end().to_string(),
            metadata: Some(metadata),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_metadata_emits_nothing() {
        assert_eq!(encode_metadata(&StreamMetadata::default()).unwrap(), None);
    }

    #[test]
    fn test_encode_wraps_compact_json_in_markers() {
        let metadata = StreamMetadata {
            thinking: Some("plan".to_string()),
            ..Default::default()
        };
        let frame = encode_metadata(&metadata).unwrap().unwrap();
        assert_eq!(
            frame,
            "<<<METADATA_START>>>{\"thinking\":\"plan\"}<<<METADATA_END>>>"
        );
    }

    #[test]
    fn test_transcript_uses_camel_case_keys() {
        let mut transcript = TranscriptMetadata::new("call.mp3", "hello there");
        transcript.processed_content = Some("Summary".to_string());
        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(json["processedContent"], "Summary");
        assert_eq!(json["filename"], "call.mp3");
    }

    #[test]
    fn test_decode_marker_form() {
        let metadata = StreamMetadata {
            citations: Some(vec![Citation::new("Docs", "https://docs.rs")]),
            ..Default::default()
        };
        let text = format!("Answer text{}", encode_metadata(&metadata).unwrap().unwrap());
        let decoded = decode_message(&text);
        assert_eq!(decoded.content, "Answer text");
        assert_eq!(decoded.metadata, Some(metadata));
    }

    #[test]
    fn test_decode_without_metadata() {
        let decoded = decode_message("just text {not json");
        assert_eq!(decoded.content, "just text {not json");
        assert!(decoded.metadata.is_none());
    }

    #[test]
    fn test_decode_malformed_frame_falls_back_to_plain_text() {
        let text = "Hello<<<METADATA_START>>>{\"citations\": [<<<METADATA_END>>>";
        let decoded = decode_message(text);
        assert_eq!(decoded.content, text);
        assert!(decoded.metadata.is_none());
    }

    #[test]
    fn test_decode_missing_end_marker() {
        let text = "Hello<<<METADATA_START>>>{\"thinking\":\"t\"}";
        let decoded = decode_message(text);
        assert_eq!(decoded.content, "Hello");
        assert_eq!(decoded.metadata.unwrap().thinking.as_deref(), Some("t"));
    }

    #[test]
    fn test_decode_legacy_trailing_json() {
        let text = "Some answer\n\n{\"citations\":[{\"title\":\"A\",\"url\":\"https://a\"}]}";
        let decoded = decode_message(text);
        assert_eq!(decoded.content, "Some answer");
        let citations = decoded.metadata.unwrap().citations.unwrap();
        assert_eq!(citations[0].url, "https://a");
    }

    #[test]
    fn test_decode_legacy_ignores_unrelated_json() {
        let text = "Here is config: {\"port\": 8080}";
        let decoded = decode_message(text);
        assert_eq!(decoded.content, text);
        assert!(decoded.metadata.is_none());
    }

    #[test]
    fn test_decode_legacy_with_braces_in_content() {
        let text = "Use {braces} freely {\"thinking\":\"why\"}";
        let decoded = decode_message(text);
        assert_eq!(decoded.content, "Use {braces} freely");
        assert_eq!(decoded.metadata.unwrap().thinking.as_deref(), Some("why"));
    }
}
