use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(text.into()))
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(Role::User, MessageContent::Parts(parts))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(text.into()))
    }

    /// Content type tags carried by this message
    pub fn content_types(&self) -> BTreeSet<ContentType> {
        self.content.content_types()
    }

    /// Audio parts attached to a user message
    pub fn audio_parts(&self) -> Vec<&AudioRef> {
        match (self.role, &self.content) {
            (Role::User, MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Audio { audio } => Some(audio),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn content_types(&self) -> BTreeSet<ContentType> {
        match self {
            MessageContent::Text(text) if text.trim().is_empty() => BTreeSet::new(),
            MessageContent::Text(_) => BTreeSet::from([ContentType::Text]),
            MessageContent::Parts(parts) => parts.iter().map(ContentPart::content_type).collect(),
        }
    }

    /// Text parts joined with spaces; `None` when there is no non-blank text
    pub fn text(&self) -> Option<String> {
        let text = match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    #[serde(rename = "file")]
    File { file: FileRef },
    #[serde(rename = "audio")]
    Audio { audio: AudioRef },
}

impl ContentPart {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentPart::Text { .. } => ContentType::Text,
            ContentPart::ImageUrl { .. } => ContentType::Image,
            ContentPart::File { .. } => ContentType::File,
            ContentPart::Audio { .. } => ContentType::Audio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>, // "auto", "low", or "high"
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

/// Reference to an uploaded audio or video file; blob storage is external
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AudioRef {
    pub filename: String,
    pub url: String,
}

/// Detected content category of the request input
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    File,
    Image,
    Audio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_roundtrip_with_parts() {
        let json = serde_json::json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "what is in this recording?"},
                {"type": "audio", "audio": {"filename": "memo.m4a", "url": "blob://memo"}}
            ]
        });
        let message: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(
            message.content_types(),
            BTreeSet::from([ContentType::Text, ContentType::Audio])
        );
        assert_eq!(message.audio_parts()[0].filename, "memo.m4a");
    }

    #[test]
    fn test_plain_text_content() {
        let message: ChatMessage =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(message, ChatMessage::user("hi"));
        assert_eq!(message.content_types(), BTreeSet::from([ContentType::Text]));
    }

    #[test]
    fn test_blank_text_has_no_tags() {
        assert!(ChatMessage::user("   ").content_types().is_empty());
        assert!(ChatMessage::assistant("").content_types().is_empty());
    }

    #[test]
    fn test_every_role_accepts_both_content_forms() {
        for role in ["system", "user", "assistant"] {
            let parts: ChatMessage = serde_json::from_value(serde_json::json!({
                "role": role,
                "content": [{"type": "text", "text": "be brief"}]
            }))
            .unwrap();
            assert_eq!(parts.content.text().as_deref(), Some("be brief"));

            let plain: ChatMessage = serde_json::from_value(serde_json::json!({
                "role": role,
                "content": "be brief"
            }))
            .unwrap();
            assert_eq!(plain.role, parts.role);
            assert_eq!(plain.content_types(), BTreeSet::from([ContentType::Text]));
        }
    }

    #[test]
    fn test_audio_parts_only_read_from_user_turns() {
        let audio = ContentPart::Audio {
            audio: AudioRef {
                filename: "memo.m4a".to_string(),
                url: "blob://memo".to_string(),
            },
        };
        let assistant =
            ChatMessage::new(Role::Assistant, MessageContent::Parts(vec![audio.clone()]));
        assert!(assistant.audio_parts().is_empty());
        assert_eq!(ChatMessage::user_parts(vec![audio]).audio_parts().len(), 1);
    }
}
