//! Web browser tool
//!
//! Fetches a page and reduces it to readable text. Failures come back as
//! in-band messages so the cognitive loop can fold them into its trace
//! instead of aborting the request.

use super::Tool;
use crate::error::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tracing::warn;

pub const BROWSER_TOOL_NAME: &str = "WebBrowser";
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

lazy_static! {
    static ref SCRIPT_RE: Regex =
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"[ \t]{2,}").unwrap();
}

pub struct WebBrowserTool {
    http_client: reqwest::Client,
}

impl WebBrowserTool {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(PAGE_LOAD_TIMEOUT)
            .user_agent("noesis/0.2")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http_client }
    }

    fn html_to_text(html: &str) -> String {
        let without_scripts = SCRIPT_RE.replace_all(html, " ");
        let without_tags = TAG_RE.replace_all(&without_scripts, " ");
        let collapsed = WHITESPACE_RE.replace_all(&without_tags, " ");
        collapsed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for WebBrowserTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebBrowserTool {
    fn name(&self) -> &str {
        BROWSER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetches a web page by URL and returns its readable text content."
    }

    async fn use_async(&self, input: &str) -> Result<String> {
        let url = input.trim();
        match self.http_client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    warn!(%status, url, "page fetch returned an error status");
                    return Ok(format!(
                        "Failed to load the page at {} (HTTP {}).",
                        url, status
                    ));
                }
                match response.text().await {
                    Ok(body) => Ok(Self::html_to_text(&body)),
                    Err(e) => Ok(format!("Failed to read the page body from {}: {}", url, e)),
                }
            }
            Err(e) => {
                warn!(url, "page fetch failed: {}", e);
                Ok(format!("Failed to load the page at {}: {}", url, e))
            }
        }
    }
}
