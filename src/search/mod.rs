//! Academic paper search for the resource finder.

mod arxiv;

pub use arxiv::{parse_atom_feed, ArxivSearch};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A paper returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub url: String,
    /// Publication date as `YYYY-MM-DD`.
    pub published: String,
}

/// Words kept from a query when a backend sets no limit of its own.
pub const DEFAULT_QUERY_WORDS: usize = 5;

/// Trait for paper search backends.
#[async_trait]
pub trait PaperSearch: Send + Sync {
    /// Top results for a topic query.
    async fn search(&self, query: &str) -> Result<Vec<Paper>>;

    /// The query text this backend actually sends.
    fn effective_query(&self, query: &str) -> String {
        clean_query(query, DEFAULT_QUERY_WORDS)
    }
}

/// Keep only the first `max_words` words of a query.
pub fn clean_query(query: &str, max_words: usize) -> String {
    query.split_whitespace().take(max_words).collect::<Vec<_>>().join(" ")
}

/// Render search results for the model.
pub fn format_papers(query: &str, papers: &[Paper]) -> String {
    if papers.is_empty() {
        return format!(
            "No academic resources found for: {}\n\
             Suggestion: Try broader terms like 'machine learning' instead of specific algorithms",
            query.trim()
        );
    }

    let entries = papers
        .iter()
        .enumerate()
        .map(|(i, paper)| {
            let authors = paper.authors.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
            format!(
                "{}. **{}**\n   Authors: {}\n   URL: {}\n   Published: {}\n",
                i + 1,
                paper.title,
                authors,
                paper.url,
                paper.published
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("**Recommended Academic Resources**:\n\n{}", entries)
}
