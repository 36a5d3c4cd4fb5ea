use chat_pipeline_rs::protocols::{
    decode_message, encode_metadata, merge_citations, Citation, StreamMetadata,
    TranscriptMetadata, METADATA_END_MARKER, METADATA_START_MARKER,
};
use serde_json::json;

#[test]
fn test_citation_dedup_by_url_then_title() {
    let merged = merge_citations([vec![
        Citation::new("", "a"),
        Citation::new("", "a"),
        Citation::new("b", ""),
    ]]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].url, "a");
    assert_eq!(merged[1].title, "b");
}

#[test]
fn test_citation_dedup_across_lists_keeps_first_seen() {
    let merged = merge_citations([
        vec![Citation::new("Provider", "https://x.example").with_index(3)],
        vec![
            Citation::new("Search", "https://x.example").with_index(1),
            Citation::new("Other", "https://y.example"),
        ],
    ]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].title, "Provider");
    assert_eq!(merged[0].index, Some(3));
}

#[test]
fn test_marker_form_round_trip_through_decoder() {
    let mut transcript = TranscriptMetadata::new("call.mp3", "so um yes");
    transcript.processed_content = Some("Yes.".to_string());
    let metadata = StreamMetadata {
        citations: Some(vec![
            Citation::new("Docs", "https://docs.example").with_date("2024-05-01")
        ]),
        thinking: Some("short".to_string()),
        transcript: Some(transcript),
    };

    let frame = encode_metadata(&metadata).unwrap().unwrap();
    assert!(frame.starts_with(METADATA_START_MARKER));
    assert!(frame.ends_with(METADATA_END_MARKER));

    let decoded = decode_message(&format!("Yes.{}", frame));
    assert_eq!(decoded.content, "Yes.");
    assert_eq!(decoded.metadata, Some(metadata));
}

#[test]
fn test_frame_json_uses_wire_field_names() {
    let mut transcript = TranscriptMetadata::new("memo.m4a", "raw");
    transcript.processed_content = Some("done".to_string());
    let frame = encode_metadata(&StreamMetadata {
        transcript: Some(transcript),
        ..Default::default()
    })
    .unwrap()
    .unwrap();

    let payload = frame
        .strip_prefix(METADATA_START_MARKER)
        .and_then(|rest| rest.strip_suffix(METADATA_END_MARKER))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(payload).unwrap();
    assert_eq!(
        value,
        json!({
            "transcript": {
                "filename": "memo.m4a",
                "transcript": "raw",
                "processedContent": "done"
            }
        })
    );
}

#[test]
fn test_legacy_trailing_json_is_decoded() {
    let text = format!(
        "The answer is 42.\n{}",
        json!({"thinking": "counted", "citations": [{"title": "Guide", "url": "https://g.example"}]})
    );
    let decoded = decode_message(&text);
    assert_eq!(decoded.content, "The answer is 42.");

    let metadata = decoded.metadata.unwrap();
    assert_eq!(metadata.thinking.as_deref(), Some("counted"));
    assert_eq!(metadata.citations.unwrap()[0].title, "Guide");
}

#[test]
fn test_marker_form_wins_over_legacy_shape() {
    let text = format!(
        "Body {{\"thinking\":\"inline\"}}{}{{\"thinking\":\"framed\"}}{}",
        METADATA_START_MARKER, METADATA_END_MARKER
    );
    let decoded = decode_message(&text);
    assert_eq!(decoded.content, "Body {\"thinking\":\"inline\"}");
    assert_eq!(decoded.metadata.unwrap().thinking.as_deref(), Some("framed"));
}

#[test]
fn test_plain_text_is_untouched() {
    for text in ["", "plain answer", "ends with a brace }", "{\"other\": 1}"] {
        let decoded = decode_message(text);
        assert_eq!(decoded.content, text);
        assert!(decoded.metadata.is_none());
    }
}
