use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Domains the search provider is allowed to return results from. Keeps the
/// agent pointed at academic sources.
pub const ACADEMIC_DOMAINS: &[&str] = &[
    "arxiv.org",
    "scholar.google.com",
    "pubmed.ncbi.nlm.nih.gov",
    "ncbi.nlm.nih.gov",
    "sciencedirect.com",
    "nature.com",
    "science.org",
    "ieee.org",
    "acm.org",
    "researchgate.net",
    "semanticscholar.org",
    "biorxiv.org",
    "medrxiv.org",
    "plos.org",
    "frontiersin.org",
    "mdpi.com",
    "springer.com",
    "wiley.com",
    "cell.com",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Tavily web search, restricted to the academic domain allow-list.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearch {
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| Error::Provider("TAVILY_API_KEY is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("research-agent/0.1")
            .build()
            .map_err(|e| Error::Provider(format!("failed to build http client: {e}")))?;

        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": format!("{query} research paper academic"),
            "max_results": max_results,
            "search_depth": "advanced",
            "include_domains": ACADEMIC_DOMAINS,
        });

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "search returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("search response is not json: {e}")))?;

        // Provider responses are untrusted: validate shape before use.
        let results = payload
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| {
                Error::Provider("malformed search response: missing results array".to_string())
            })?;

        let mut hits = Vec::with_capacity(results.len());
        for entry in results {
            let url = entry
                .get("url")
                .and_then(|u| u.as_str())
                .ok_or_else(|| {
                    Error::Provider("malformed search result: missing url".to_string())
                })?;

            hits.push(SearchHit {
                title: entry
                    .get("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("Untitled")
                    .to_string(),
                url: url.to_string(),
                snippet: entry
                    .get("content")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(hits)
    }
}
