//! Keyword search against the YouTube Data API v3.
//!
//! A search is two requests: `search.list` for ids and snippets, then one
//! `videos.list` for duration and view counts of those ids.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AppError, Result},
    model::{SearchQuery, SearchResult},
    utils::format_iso8601_duration,
};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

/// The API accepts 1..=50 for `maxResults`.
pub const MAX_RESULTS_LIMIT: u32 = 50;

#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;
}

pub struct YouTubeApi {
    client: reqwest::Client,
    api_key: String,
}

impl YouTubeApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                status,
                message: api_error_message(&body),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl VideoSearch for YouTubeApi {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::MissingApiKey);
        }

        let max_results = query.max_results.clamp(1, MAX_RESULTS_LIMIT);
        let search: SearchListResponse = self
            .get_json(
                SEARCH_URL,
                &[
                    ("part", "snippet".to_string()),
                    ("q", query.query_text()),
                    ("type", "video".to_string()),
                    ("maxResults", max_results.to_string()),
                    ("key", self.api_key.clone()),
                    ("relevanceLanguage", query.language.clone()),
                ],
            )
            .await?;
        debug!(items = search.items.len(), "search.list returned");

        let ids = search
            .items
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect::<Vec<_>>()
            .join(",");
        if ids.is_empty() {
            return Err(AppError::NoResults);
        }

        let details: VideoListResponse = self
            .get_json(
                VIDEOS_URL,
                &[
                    ("part", "contentDetails,statistics".to_string()),
                    ("id", ids),
                    ("key", self.api_key.clone()),
                ],
            )
            .await?;

        Ok(assemble_results(search, details))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    // The API sends counts as strings.
    view_count: Option<String>,
}

/// Joins search items with their details by id, keeping search order.
pub fn assemble_results(search: SearchListResponse, details: VideoListResponse) -> Vec<SearchResult> {
    let details: HashMap<String, VideoItem> = details
        .items
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    search
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            let detail = details.get(&id);
            let duration = detail
                .and_then(|d| d.content_details.as_ref())
                .and_then(|c| c.duration.as_deref())
                .unwrap_or("PT0S");
            let view_count = detail
                .and_then(|d| d.statistics.as_ref())
                .and_then(|s| s.view_count.as_deref())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let snippet = item.snippet;
            let thumbnail_url = ["medium", "default", "high"]
                .iter()
                .find_map(|size| snippet.thumbnails.get(*size))
                .map(|t| t.url.clone());

            Some(SearchResult {
                url: format!("https://www.youtube.com/watch?v={}", id),
                published: snippet.published_at.chars().take(10).collect(),
                title: snippet.title,
                channel: snippet.channel_title,
                duration: format_iso8601_duration(duration),
                view_count,
                thumbnail_url,
                id,
            })
        })
        .collect()
}

fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<Envelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_fixture() -> SearchListResponse {
        serde_json::from_value(json!({
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "vid1" },
                    "snippet": {
                        "title": "Python for beginners",
                        "channelTitle": "Teach Co",
                        "publishedAt": "2023-04-05T10:11:12Z",
                        "thumbnails": { "default": { "url": "https://i.ytimg.com/vi/vid1/default.jpg" } }
                    }
                },
                {
                    "id": { "kind": "youtube#video", "videoId": "vid2" },
                    "snippet": {
                        "title": "Advanced Python",
                        "channelTitle": "Other",
                        "publishedAt": "2021-01-01T00:00:00Z"
                    }
                },
                {
                    "id": { "kind": "youtube#channel", "channelId": "UC1" },
                    "snippet": { "title": "A channel" }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn joins_details_by_id_in_search_order() {
        let details: VideoListResponse = serde_json::from_value(json!({
            "items": [
                {
                    "id": "vid2",
                    "contentDetails": { "duration": "PT1H2M3S" },
                    "statistics": { "viewCount": "1500" }
                },
                {
                    "id": "vid1",
                    "contentDetails": { "duration": "PT4M5S" },
                    "statistics": { "viewCount": "42" }
                }
            ]
        }))
        .unwrap();

        let results = assemble_results(search_fixture(), details);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].id, "vid1");
        assert_eq!(results[0].title, "Python for beginners");
        assert_eq!(results[0].channel, "Teach Co");
        assert_eq!(results[0].published, "2023-04-05");
        assert_eq!(results[0].url, "https://www.youtube.com/watch?v=vid1");
        assert_eq!(results[0].duration, "4:05");
        assert_eq!(results[0].view_count, 42);
        assert_eq!(
            results[0].thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/vid1/default.jpg")
        );

        assert_eq!(results[1].duration, "1:02:03");
        assert_eq!(results[1].view_count, 1500);
        assert_eq!(results[1].thumbnail_url, None);
    }

    #[test]
    fn missing_details_default_to_zero() {
        let details = VideoListResponse { items: Vec::new() };
        let results = assemble_results(search_fixture(), details);
        assert!(results.iter().all(|r| r.duration == "0:00" && r.view_count == 0));
    }

    #[test]
    fn api_error_message_prefers_envelope() {
        let body = r#"{"error":{"code":403,"message":"API key not valid."}}"#;
        assert_eq!(api_error_message(body), "API key not valid.");
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn empty_api_key_fails_before_any_request() {
        let api = YouTubeApi::new("  ");
        let query = SearchQuery {
            keywords: "rust".into(),
            language: "en".into(),
            level: Default::default(),
            max_results: 5,
        };
        assert!(matches!(api.search(&query).await, Err(AppError::MissingApiKey)));
    }
}
