//! arXiv search over the public Atom API.

use super::{clean_query, Paper, PaperSearch};
use crate::config::SearchSettings;
use crate::error::{Result, StudyError};
use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use tracing::{debug, instrument};

/// Searches arXiv by relevance.
pub struct ArxivSearch {
    http: reqwest::Client,
    endpoint: String,
    max_results: usize,
    max_query_words: usize,
}

impl ArxivSearch {
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            max_results: settings.max_results,
            max_query_words: settings.max_query_words,
        })
    }
}

#[async_trait]
impl PaperSearch for ArxivSearch {
    fn effective_query(&self, query: &str) -> String {
        clean_query(query, self.max_query_words)
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Paper>> {
        let query = self.effective_query(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = url::Url::parse_with_params(
            &self.endpoint,
            &[
                ("search_query", format!("all:{}", query)),
                ("start", "0".to_string()),
                ("max_results", self.max_results.to_string()),
                ("sortBy", "relevance".to_string()),
            ],
        )
        .map_err(|e| StudyError::Config(format!("Invalid search endpoint: {}", e)))?;

        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let papers = parse_atom_feed(&body, self.max_results)?;
        debug!("arXiv returned {} paper(s) for '{}'", papers.len(), query);
        Ok(papers)
    }
}

/// Parse up to `limit` entries from an arXiv Atom feed.
pub fn parse_atom_feed(xml: &str, limit: usize) -> Result<Vec<Paper>> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();
    let mut current: Option<Paper> = None;
    let mut field: Option<Vec<u8>> = None;
    let mut in_author = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"entry" => {
                        current = Some(Paper {
                            title: String::new(),
                            authors: Vec::new(),
                            url: String::new(),
                            published: String::new(),
                        })
                    }
                    b"author" => in_author = true,
                    _ => field = Some(name),
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(paper) = current.take() {
                        papers.push(paper);
                        if papers.len() >= limit {
                            break;
                        }
                    }
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Ok(Event::Text(e)) => {
                let (Some(paper), Some(name)) = (current.as_mut(), field.as_deref()) else {
                    continue;
                };
                let text = e
                    .unescape()
                    .map_err(|e| StudyError::InvalidInput(format!("Malformed arXiv feed: {}", e)))?;
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    continue;
                }
                match name {
                    b"title" if !in_author => paper.title.push_str(&text),
                    b"id" => paper.url = text,
                    b"published" => paper.published = format_date(&text),
                    b"name" if in_author => paper.authors.push(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(StudyError::InvalidInput(format!("Malformed arXiv feed: {}", e)));
            }
            _ => {}
        }
    }

    Ok(papers)
}

fn format_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.chars().take(10).collect())
}
