//! # Tools Module
//!
//! The `web_search` tool the research stages call through Rig. Searches go
//! to DuckDuckGo's HTML endpoint. Every result the tool hands to the model
//! is also written to a shared `SearchLog`, which is where a turn's
//! grounding metadata comes from.

use regex::Regex;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

// =============================================================================
// ERRORS
// =============================================================================
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Failed to perform web search: {0}")]
    SearchFailed(String),

    #[error("Rate limited by search provider, please wait")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

// =============================================================================
// SEARCH RESULTS
// =============================================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub domain: String,
    pub snippet: String,
}

/// Results returned by a `WebSearchTool`, shared between its clones.
#[derive(Debug, Clone, Default)]
pub struct SearchLog {
    results: Arc<Mutex<Vec<SearchResult>>>,
}

impl SearchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.results.lock().await.len()
    }

    pub async fn record(&self, results: &[SearchResult]) {
        self.results.lock().await.extend_from_slice(results);
    }

    pub async fn is_empty(&self) -> bool {
        self.results.lock().await.is_empty()
    }

    /// Remove and return the results recorded after position `mark`.
    pub async fn take_since(&self, mark: usize) -> Vec<SearchResult> {
        let mut results = self.results.lock().await;
        if mark >= results.len() {
            return Vec::new();
        }
        results.drain(mark..).collect()
    }
}

// =============================================================================
// HTML PARSING
// =============================================================================
static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .expect("valid result link pattern")
});

static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#).expect("valid snippet pattern")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// Resolve DuckDuckGo's `//duckduckgo.com/l/?uddg=<encoded>` redirect links.
fn resolve_result_url(href: &str) -> Option<String> {
    let url = match href.split_once("uddg=") {
        Some((_, rest)) => {
            let encoded = rest.split('&').next().unwrap_or(rest);
            urlencoding::decode(encoded).ok()?.into_owned()
        }
        None if href.starts_with("//") => format!("https:{href}"),
        None => href.to_string(),
    };

    (url.starts_with("http") && !url.contains("duckduckgo.com")).then_some(url)
}

fn clean_text(fragment: &str) -> String {
    HTML_TAG
        .replace_all(fragment, "")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the host from a URL, without a leading `www.`.
pub fn extract_domain(url: &str) -> Option<String> {
    let host = url.split("//").nth(1)?.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.trim_start_matches("www.").to_string())
}

fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let links: Vec<_> = RESULT_LINK.captures_iter(html).collect();

    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for (i, caps) in links.iter().enumerate() {
        if results.len() >= max_results {
            break;
        }
        let Some(url) = resolve_result_url(&caps[1]) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        // A result's snippet sits between its link and the next result's link
        let block_start = caps.get(0).map_or(0, |m| m.end());
        let block_end = links
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let snippet = RESULT_SNIPPET
            .captures(&html[block_start..block_end])
            .map(|c| clean_text(&c[1]))
            .unwrap_or_default();

        let domain = extract_domain(&url).unwrap_or_default();
        let title = clean_text(&caps[2]);
        results.push(SearchResult {
            title: if title.is_empty() { domain.clone() } else { title },
            domain,
            snippet,
            url,
        });
    }

    results
}

// =============================================================================
// WEB SEARCH TOOL
// =============================================================================
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    max_results: usize,
    log: SearchLog,
}

impl WebSearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            log: SearchLog::new(),
        }
    }

    pub fn log(&self) -> &SearchLog {
        &self.log
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Performing web search");

        // Stay polite to the HTML endpoint
        tokio::time::sleep(Duration::from_millis(500)).await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()?;

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );
        debug!(url = %url, "Fetching search results");

        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(SearchError::RateLimited);
            }
            return Err(SearchError::SearchFailed(format!("HTTP {}", response.status())));
        }

        let body = response.text().await?;
        let results = parse_results(&body, self.max_results);

        if results.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = results.len(), "Search completed");
        }
        Ok(results)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchArgs {
    pub query: String,
}

impl Tool for WebSearchTool {
    const NAME: &'static str = "web_search";

    type Args = SearchArgs;
    type Output = String;
    type Error = SearchError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search the web for current information about places, hotels, restaurants, attractions and travel logistics.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A specific, targeted web search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let results = self.search(&args.query).await?;
        self.log.record(&results).await;

        if results.is_empty() {
            return Ok(format!("No results found for: {}", args.query));
        }

        let formatted = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. **{}**\n   URL: {}\n   {}\n", i + 1, r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("## Search Results for: {}\n\n{}", args.query, formatted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.visitdubai.com%2Fen%2Fhotels&amp;rut=abc">Best <b>Hotels</b> in Dubai</a>
  <a class="result__snippet" href="x">Luxury stays &amp; beach resorts.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://timeout.com/dubai/cafes">Cafes</a>
  <a class="result__snippet" href="y">Hidden gem cafes.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://duckduckgo.com/ad">Ad</a>
  <a class="result__snippet" href="z">Sponsored.</a>
</div>
"#;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.example.com/page"), Some("example.com".to_string()));
        assert_eq!(extract_domain("https://rust-lang.org?x=1"), Some("rust-lang.org".to_string()));
        assert_eq!(extract_domain("not a url"), None);
    }

    #[test]
    fn test_parse_results_resolves_redirects_and_snippets() {
        let results = parse_results(PAGE, 5);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].url, "https://www.visitdubai.com/en/hotels");
        assert_eq!(results[0].title, "Best Hotels in Dubai");
        assert_eq!(results[0].domain, "visitdubai.com");
        assert_eq!(results[0].snippet, "Luxury stays & beach resorts.");

        assert_eq!(results[1].url, "https://timeout.com/dubai/cafes");
        assert_eq!(results[1].snippet, "Hidden gem cafes.");
    }

    #[test]
    fn test_parse_results_respects_limit() {
        assert_eq!(parse_results(PAGE, 1).len(), 1);
    }

    #[test]
    fn test_result_without_snippet_keeps_empty_snippet() {
        let page = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="https://a.com/souks">Old Souks</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://b.com/dhow">Dhow Cruise</a>
  <a class="result__snippet" href="b">Dinner on the creek.</a>
</div>
"#;
        let results = parse_results(page, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://a.com/souks");
        assert_eq!(results[0].snippet, "");
        assert_eq!(results[1].snippet, "Dinner on the creek.");
    }

    #[tokio::test]
    async fn test_search_log_take_since_mark() {
        let log = SearchLog::new();
        let first = SearchResult {
            title: "A".to_string(),
            url: "https://a.com".to_string(),
            domain: "a.com".to_string(),
            snippet: String::new(),
        };
        log.record(&[first.clone()]).await;
        let mark = log.len().await;

        let second = SearchResult { url: "https://b.com".to_string(), ..first };
        log.record(&[second.clone()]).await;

        assert_eq!(log.take_since(mark).await, vec![second]);
        // Taken results are gone; earlier ones stay
        assert_eq!(log.len().await, 1);
        assert!(log.take_since(mark).await.is_empty());
        assert!(log.take_since(10).await.is_empty());
        assert!(!log.is_empty().await);
    }
}
