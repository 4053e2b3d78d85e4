//! Web search tool
//!
//! Thin Tavily-backed search, registered only when an API key is present
//! in the environment. Used by the autonomous research cycle and by the
//! retrieval loop's tool escalation.

use super::Tool;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

pub const WEB_SEARCH_TOOL_NAME: &str = "WebSearch";
pub const API_KEY_ENV: &str = "TAVILY_API_KEY";

const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

pub struct WebSearchTool {
    api_key: String,
    http_client: reqwest::Client,
}

impl WebSearchTool {
    /// Build the tool when the API key is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("noesis/0.2")
            .build()
            .ok()?;
        Some(Self {
            api_key,
            http_client,
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches the web for current information on a topic."
    }

    async fn use_async(&self, input: &str) -> Result<String> {
        let body = json!({
            "api_key": self.api_key,
            "query": input,
            "include_answer": true,
            "max_results": 5,
        });

        let response = match self
            .http_client
            .post(SEARCH_ENDPOINT)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("web search request failed: {}", e);
                return Ok(format!("Web search failed: {}", e));
            }
        };

        if !response.status().is_success() {
            return Ok(format!(
                "Web search failed with HTTP {}.",
                response.status()
            ));
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return Ok(format!("Web search returned an unreadable body: {}", e)),
        };

        let mut output = String::new();
        if let Some(answer) = parsed.answer.filter(|a| !a.is_empty()) {
            output.push_str(&format!("Answer: {}\n\n", answer));
        }
        for result in parsed.results {
            output.push_str(&format!("- {} ({})\n  {}\n", result.title, result.url, result.content));
        }
        if output.is_empty() {
            output.push_str("No results found.");
        }
        Ok(output)
    }
}
