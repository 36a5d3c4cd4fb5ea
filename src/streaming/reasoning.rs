// Extraction of inline reasoning blocks (e.g. <think>...</think>) from a
// completed model response.

/// Delimiters marking inline reasoning content
#[derive(Debug, Clone)]
pub struct ThinkingDelimiters {
    pub start: String,
    pub end: String,
}

impl Default for ThinkingDelimiters {
    fn default() -> Self {
        Self {
            start: "<think>".to_string(),
            end: "</think>".to_string(),
        }
    }
}

/// A response split into display text and reasoning text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThinkingSplit {
    pub display_text: String,
    pub thinking: Option<String>,
}

/// Extract reasoning blocks using the default `<think>` delimiters.
pub fn extract_thinking(text: &str) -> ThinkingSplit {
    extract_thinking_with(text, &ThinkingDelimiters::default())
}

/// Extract every delimited reasoning block from `text`.
///
/// A block missing its end delimiter is treated as reasoning truncated by the
/// end of the response.
pub fn extract_thinking_with(text: &str, delimiters: &ThinkingDelimiters) -> ThinkingSplit {
    if !text.contains(&delimiters.start) {
        return ThinkingSplit {
            display_text: text.to_string(),
            thinking: None,
        };
    }

    let mut display = String::with_capacity(text.len());
    let mut blocks: Vec<&str> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&delimiters.start) {
        display.push_str(&rest[..start]);
        let inner = &rest[start + delimiters.start.len()..];
        match inner.find(&delimiters.end) {
            Some(end) => {
                blocks.push(inner[..end].trim());
                rest = &inner[end + delimiters.end.len()..];
            }
            None => {
                // Truncated reasoning
                blocks.push(inner.trim());
                rest = "";
            }
        }
    }
    display.push_str(rest);

    let thinking = blocks
        .into_iter()
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    ThinkingSplit {
        display_text: display.trim().to_string(),
        thinking: (!thinking.is_empty()).then_some(thinking),
    }
}
