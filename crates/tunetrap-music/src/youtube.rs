//! YouTube Data API v3 video search.

use crate::fallback::Recommendation;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed search response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A remote video search backend.
pub trait VideoSearch {
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<Recommendation>, SearchError>> + Send;
}

/// Search query used for an emotion label.
pub fn emotion_to_query(label: &str) -> String {
    match label.to_ascii_lowercase().as_str() {
        "happy" => "upbeat happy songs playlist".into(),
        "sad" => "emotional sad songs playlist".into(),
        "angry" => "calming music for anger playlist".into(),
        "surprise" => "energetic music playlist".into(),
        "neutral" => "chill vibes playlist".into(),
        _ => format!("{label} mood songs"),
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: ItemId,
    snippet: Option<Snippet>,
}

#[derive(Deserialize, Default)]
struct ItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

/// Turn a `search.list` JSON body into recommendations.
///
/// Items without a `videoId` (channels, playlists) are skipped.
pub fn parse_search_response(body: &str) -> Result<Vec<Recommendation>, SearchError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            Some(Recommendation {
                title: item.snippet.map(|s| s.title).unwrap_or_default(),
                link: format!("{WATCH_URL}{video_id}"),
            })
        })
        .collect())
}

pub struct YouTubeSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl YouTubeSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: SEARCH_ENDPOINT.to_string(),
        }
    }

    /// Point at a different API root (for proxies or local testing).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl VideoSearch for YouTubeSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Recommendation>, SearchError> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let results = parse_search_response(&body)?;
        tracing::debug!(query, results = results.len(), "youtube search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_to_query() {
        assert_eq!(emotion_to_query("happy"), "upbeat happy songs playlist");
        assert_eq!(emotion_to_query("sad"), "emotional sad songs playlist");
        assert_eq!(emotion_to_query("angry"), "calming music for anger playlist");
        assert_eq!(emotion_to_query("Surprise"), "energetic music playlist");
        assert_eq!(emotion_to_query("neutral"), "chill vibes playlist");
        assert_eq!(emotion_to_query("bored"), "bored mood songs");
    }

    #[test]
    fn test_parse_skips_items_without_video_id() {
        let body = r#"{
            "kind": "youtube#searchListResponse",
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"}, "snippet": {"title": "Happy Song"}},
                {"id": {"kind": "youtube#channel", "channelId": "UCxyz"}, "snippet": {"title": "A Channel"}},
                {"id": {"kind": "youtube#video", "videoId": "def456"}, "snippet": {"title": "Another"}}
            ]
        }"#;
        let recs = parse_search_response(body).unwrap();
        assert_eq!(
            recs,
            vec![
                Recommendation {
                    title: "Happy Song".into(),
                    link: "https://www.youtube.com/watch?v=abc123".into(),
                },
                Recommendation {
                    title: "Another".into(),
                    link: "https://www.youtube.com/watch?v=def456".into(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_no_items() {
        assert!(parse_search_response(r#"{"kind": "youtube#searchListResponse"}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_search_response("<html>"), Err(SearchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let search = YouTubeSearch::new("key").with_endpoint("http://127.0.0.1:1/search");
        assert!(matches!(search.search("q", 1).await, Err(SearchError::Http(_))));
    }
}
