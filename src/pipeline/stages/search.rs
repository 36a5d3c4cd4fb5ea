//! Search enrichment stage
//!
//! Runs a web/RAG search for the latest user question and attaches the
//! deduplicated results to the context. The citations later travel to the
//! stream processor as externally supplied citations.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::PipelineStage;
use crate::{
    pipeline::{
        context::{PipelineContext, SearchEnrichment},
        error::{ErrorCode, PipelineError},
    },
    protocols::{merge_citations, Citation},
};

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub citation: Citation,
    pub snippet: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    #[error("Search request failed: {0}")]
    RequestFailed(String),
}

/// Search backend collaborator
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

pub struct SearchEnrichmentStage {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl SearchEnrichmentStage {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl PipelineStage for SearchEnrichmentStage {
    fn name(&self) -> &'static str {
        "SearchEnrichment"
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        ctx.web_search
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        let Some(query) = ctx.last_user_text() else {
            return Ok(ctx.clone().with_error(PipelineError::warning(
                ErrorCode::MissingParameter,
                "Web search requested but no user question found",
            )));
        };

        let results = match self.provider.search(&query).await {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "Search provider failed");
                return Ok(ctx.clone().with_error(
                    PipelineError::error(ErrorCode::SearchFailed, "Web search failed")
                        .with_metadata("query", query)
                        .with_cause(err),
                ));
            }
        };

        let mut snippets = HashMap::new();
        for result in &results {
            if let Some(key) = result.citation.dedup_key() {
                snippets
                    .entry(key.to_string())
                    .or_insert_with(|| result.snippet.clone());
            }
        }

        let citations: Vec<Citation> =
            merge_citations([results.into_iter().map(|r| r.citation)])
                .into_iter()
                .take(self.max_results)
                .enumerate()
                .map(|(i, citation)| citation.with_index(i + 1))
                .collect();

        let context = citations
            .iter()
            .map(|citation| {
                let snippet = citation
                    .dedup_key()
                    .and_then(|key| snippets.get(key))
                    .map(String::as_str)
                    .unwrap_or("");
                format!(
                    "[{}] {} ({})\n{}",
                    citation.index.unwrap_or_default(),
                    citation.title,
                    citation.url,
                    snippet
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(query = %query, results = citations.len(), "Search enrichment complete");

        Ok(ctx.clone().with_search_enrichment(SearchEnrichment {
            query,
            citations,
            context,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pipeline::error::ErrorSeverity, protocols::chat::ChatMessage};

    struct StaticSearch(Vec<SearchResult>);

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
            Err(SearchError::Unavailable("quota exhausted".to_string()))
        }
    }

    fn hit(title: &str, url: &str) -> SearchResult {
        SearchResult {
            citation: Citation::new(title, url),
            snippet: format!("about {}", title),
        }
    }

    fn search_ctx() -> PipelineContext {
        PipelineContext::new("gpt-4o", vec![ChatMessage::user("latest rust release?")])
            .with_web_search(true)
    }

    #[test]
    fn test_only_runs_when_search_enabled() {
        let stage = SearchEnrichmentStage::new(Arc::new(FailingSearch));
        assert!(stage.should_run(&search_ctx()));
        assert!(!stage.should_run(&search_ctx().with_web_search(false)));
    }

    #[tokio::test]
    async fn test_search_dedupes_and_indexes() {
        let stage = SearchEnrichmentStage::new(Arc::new(StaticSearch(vec![
            hit("Rust 1.80", "https://blog.rust-lang.org/1.80"),
            hit("Rust 1.80 mirror", "https://blog.rust-lang.org/1.80"),
            hit("Changelog", "https://github.com/rust-lang/rust/releases"),
        ])));

        let next = stage.execute(&search_ctx()).await.unwrap();
        let search = next.enrichment.search.unwrap();
        assert_eq!(search.query, "latest rust release?");
        assert_eq!(search.citations.len(), 2);
        assert_eq!(search.citations[0].index, Some(1));
        assert_eq!(search.citations[1].index, Some(2));
        assert!(
            search
                .context
                .starts_with("[1] Rust 1.80 (https://blog.rust-lang.org/1.80)\nabout Rust 1.80")
        );
    }

    #[tokio::test]
    async fn test_search_respects_max_results() {
        let stage = SearchEnrichmentStage::new(Arc::new(StaticSearch(vec![
            hit("a", "https://a"),
            hit("b", "https://b"),
            hit("c", "https://c"),
        ])))
        .with_max_results(2);

        let next = stage.execute(&search_ctx()).await.unwrap();
        assert_eq!(next.enrichment_citations().len(), 2);
    }

    #[tokio::test]
    async fn test_search_failure_records_error_and_continues() {
        let stage = SearchEnrichmentStage::new(Arc::new(FailingSearch));
        let next = stage.execute(&search_ctx()).await.unwrap();
        assert!(next.enrichment.search.is_none());
        assert_eq!(next.errors.len(), 1);
        assert_eq!(next.errors[0].code, ErrorCode::SearchFailed);
        assert_eq!(next.errors[0].severity, ErrorSeverity::Error);
    }
}
