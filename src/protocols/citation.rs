//! Citation type and the shared deduplication unit
//!
//! Citations reach a response from two places: provider-native annotations
//! emitted inside the model stream, and search results gathered by the
//! enrichment stage. Both paths merge through [`merge_citations`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A source reference attached to a generated answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Display index shown next to the reference in the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Citation {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            date: None,
            index: None,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Identity used for deduplication: the url when present, otherwise the title.
    ///
    /// Returns `None` for citations carrying neither.
    pub fn dedup_key(&self) -> Option<&str> {
        let url = self.url.trim();
        if !url.is_empty() {
            return Some(url);
        }
        let title = self.title.trim();
        if !title.is_empty() {
            return Some(title);
        }
        None
    }
}

/// Merge any number of citation lists, keeping the first occurrence of each key.
///
/// Citations without a url or title are dropped.
pub fn merge_citations<I, L>(lists: I) -> Vec<Citation>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = Citation>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for citation in lists.into_iter().flatten() {
        let Some(key) = citation.dedup_key() else {
            continue;
        };
        if seen.insert(key.to_string()) {
            merged.push(citation);
        }
    }

    merged
}
