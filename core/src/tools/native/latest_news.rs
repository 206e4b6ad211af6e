use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::tools::{Tool, ToolError};

pub const NEWS_UNAVAILABLE: &str = "I'm sorry, unable to find any news on this topic";

const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/news/search";
const DEFAULT_TOPIC: &str = "World";
const DEFAULT_MAX_ARTICLES: usize = 4;

/// One headline handed back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Deserialize)]
struct BraveNewsResponse {
    #[serde(default)]
    results: Vec<BraveNewsResult>,
}

#[derive(Debug, Deserialize)]
struct BraveNewsResult {
    title: String,
    url: String,
}

/// `get_latest_news`: recent headlines for a topic via the Brave News API
pub struct LatestNewsTool {
    api_key: Option<String>,
    endpoint: String,
    max_articles: usize,
    http_client: reqwest::Client,
}

impl Default for LatestNewsTool {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LatestNewsTool {
    /// Reads `BRAVE_API_KEY` from the environment
    pub fn from_env() -> Self {
        let api_key = std::env::var("BRAVE_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_some() {
            info!(target: "latest_news", "Brave News API key configured");
        } else {
            warn!(target: "latest_news", "BRAVE_API_KEY not set, news lookups will come back empty");
        }
        Self::new(api_key)
    }

    pub fn new(api_key: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("colloquy/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_articles: DEFAULT_MAX_ARTICLES,
            http_client,
        }
    }

    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles.max(1);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, topic: &str) -> Result<Vec<NewsItem>, ToolError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ToolError::ExecutionFailed("BRAVE_API_KEY not configured".to_string()))?;

        debug!(target: "latest_news", topic = %topic, count = self.max_articles, "Fetching news");

        let resp = self
            .http_client
            .get(&self.endpoint)
            .query(&[("q", topic.to_string()), ("count", self.max_articles.to_string())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("News request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!(
                "Brave News API error: {} - {}",
                status, body
            )));
        }

        let data: BraveNewsResponse = resp.json().await.map_err(|e| {
            ToolError::ExecutionFailed(format!("Failed to parse news response: {}", e))
        })?;

        Ok(select_items(data, self.max_articles))
    }
}

fn select_items(data: BraveNewsResponse, max_articles: usize) -> Vec<NewsItem> {
    data.results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty() && !r.url.is_empty())
        .take(max_articles)
        .map(|r| NewsItem {
            title: r.title.trim().to_string(),
            link: r.url,
        })
        .collect()
}

/// Topic argument, falling back to "World" when missing or blank
pub fn topic_from(arguments: &Value) -> String {
    arguments
        .get("topic")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TOPIC)
        .to_string()
}

#[async_trait]
impl Tool for LatestNewsTool {
    fn name(&self) -> String {
        "get_latest_news".to_string()
    }

    fn description(&self) -> String {
        "Get the latest news for a given topic. Call this whenever you are asked to provide \
         the news for a topic. If no topic is provided, use World as a topic."
            .to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic that the user would like to get the latest news on"
                }
            },
            "required": ["topic"],
            "additionalProperties": false
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let topic = topic_from(&arguments);
        let latest_news = match self.fetch(&topic).await {
            Ok(items) if !items.is_empty() => json!(items),
            Ok(_) => json!(NEWS_UNAVAILABLE),
            Err(e) => {
                warn!(target: "latest_news", topic = %topic, error = %e, "News lookup failed");
                json!(NEWS_UNAVAILABLE)
            }
        };
        Ok(json!({
            "topic": topic,
            "latest_news": latest_news,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_defaults_to_world() {
        assert_eq!(topic_from(&json!({})), "World");
        assert_eq!(topic_from(&json!({"topic": "  "})), "World");
        assert_eq!(topic_from(&json!({"topic": "Rust"})), "Rust");
    }

    #[test]
    fn select_items_caps_and_skips_blank_titles() {
        let data: BraveNewsResponse = serde_json::from_value(json!({
            "results": [
                {"title": "A", "url": "https://a"},
                {"title": " ", "url": "https://blank"},
                {"title": "B", "url": "https://b"},
                {"title": "C", "url": "https://c"}
            ]
        }))
        .unwrap();
        let items = select_items(data, 2);
        assert_eq!(
            items,
            vec![
                NewsItem { title: "A".into(), link: "https://a".into() },
                NewsItem { title: "B".into(), link: "https://b".into() },
            ]
        );
    }

    #[tokio::test]
    async fn missing_key_degrades_to_apology() {
        let tool = LatestNewsTool::new(None);
        let out = tool.call(json!({"topic": "Space"})).await.unwrap();
        assert_eq!(out["topic"], "Space");
        assert_eq!(out["latest_news"], NEWS_UNAVAILABLE);
    }
}
