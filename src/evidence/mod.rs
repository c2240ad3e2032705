pub mod tavily;

use async_trait::async_trait;
use log::{ debug, info, warn };
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use self::tavily::TavilySearch;

pub const MAX_SOURCES: usize = 3;
pub const EXCERPT_CHARS: usize = 300;
/// Queries with this many tokens or fewer never reach the search service.
pub const MIN_QUERY_TOKENS: usize = 2;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub answer: Option<String>,
    pub excerpts: Vec<String>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchOutcome, SearchError>;
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub fn format_evidence(outcome: &SearchOutcome) -> String {
    let mut lines = Vec::with_capacity(MAX_SOURCES + 1);
    if let Some(answer) = outcome.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("DIRECT: {}", answer));
    }
    for excerpt in outcome.excerpts.iter().take(MAX_SOURCES) {
        lines.push(format!("SOURCE: {}", truncate_chars(excerpt, EXCERPT_CHARS)));
    }
    lines.join("\n")
}

/// Best-effort web evidence for a chat message. Never fails: a missing
/// search backend, a trivial query or a search error all yield "".
#[derive(Clone)]
pub struct EvidenceCollector {
    search: Option<Arc<dyn WebSearch>>,
}

impl EvidenceCollector {
    pub fn new(search: Option<Arc<dyn WebSearch>>) -> Self {
        Self { search }
    }

    pub fn disabled() -> Self {
        Self { search: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.search.is_some()
    }

    pub async fn collect(&self, query: &str, location: &str) -> String {
        if query.split_whitespace().count() <= MIN_QUERY_TOKENS {
            debug!("Skipping web search for short query");
            return String::new();
        }
        let Some(search) = &self.search else {
            return String::new();
        };

        let location = location.trim();
        let full_query = if location.is_empty() {
            query.trim().to_string()
        } else {
            format!("{} in {}", query.trim(), location)
        };

        match search.search(&full_query, MAX_SOURCES).await {
            Ok(outcome) => {
                info!("Web search returned {} source(s)", outcome.excerpts.len().min(MAX_SOURCES));
                format_evidence(&outcome)
            }
            Err(e) => {
                warn!("Web search failed, continuing without evidence: {}", e);
                String::new()
            }
        }
    }
}

pub fn initialize_evidence_collector(args: &Args) -> Result<EvidenceCollector, SearchError> {
    if args.search_api_key.trim().is_empty() {
        warn!("Web search disabled: no SEARCH_API_KEY configured");
        return Ok(EvidenceCollector::disabled());
    }
    let search = TavilySearch::from_args(args)?;
    info!("Web search configured: BaseURL={}", args.search_base_url);
    Ok(EvidenceCollector::new(Some(Arc::new(search))))
}
