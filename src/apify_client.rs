use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::collaborators::VideoSearch;
use crate::config::ApifyConfig;
use crate::error::CollaboratorError;
use crate::{count_from_value, optional_count_from_value, timestamp_from_value, EngagementCounts, VideoMetric};

const SERVICE: &str = "apify";

/// Runs the Douyin scraper actor synchronously and returns its dataset items.
#[derive(Clone)]
pub struct ApifyClient {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActorInput<'a> {
    search_terms_or_hashtags: &'a [String],
    max_items_per_url: u32,
}

impl ApifyClient {
    pub fn from_config(config: &ApifyConfig, token: String) -> Result<Self, CollaboratorError> {
        ApifyClient::new(
            config.endpoint.clone(),
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(endpoint: String, token: String, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::Config(format!("failed to build apify client: {}", err)))?;
        Ok(Self {
            endpoint,
            token,
            client,
        })
    }
}

#[async_trait]
impl VideoSearch for ApifyClient {
    async fn search_videos(
        &self,
        search_terms: &[String],
        max_videos_per_term: u32,
    ) -> Result<Vec<VideoMetric>, CollaboratorError> {
        info!(terms = ?search_terms, "starting apify scrape");
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("token", self.token.as_str())])
            .json(&ActorInput {
                search_terms_or_hashtags: search_terms,
                max_items_per_url: max_videos_per_term,
            })
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "apify request failed");
            return Err(CollaboratorError::upstream(SERVICE, status.as_u16(), &body));
        }

        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;
        info!(count = items.len(), "apify scrape returned items");

        Ok(items.iter().map(video_from_item).collect())
    }
}

/// Maps one scraped dataset item; missing fields become zero or absent.
pub fn video_from_item(item: &Value) -> VideoMetric {
    let stats = &item["statistics"];
    let author = &item["authorMeta"];

    VideoMetric {
        aweme_id: string_field(item, &["id", "awemeId", "aweme_id"]).unwrap_or_default(),
        creator_sec_uid: string_field(author, &["secUid"]).unwrap_or_default(),
        creator_name: string_field(author, &["name", "nickName"]),
        description: string_field(item, &["text", "desc"]),
        engagement: EngagementCounts {
            likes: count_from_value(&stats["diggCount"]),
            comments: count_from_value(&stats["commentCount"]),
            shares: count_from_value(&stats["shareCount"]),
            collects: count_from_value(&stats["collectCount"]),
            recommends: 0,
        },
        created_at: timestamp_from_value(&item["createTime"]),
        follower_count: optional_count_from_value(&author["fans"]),
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match &value[*key] {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_dataset_item() {
        let item = json!({
            "id": "7301",
            "text": "sunset",
            "createTime": 1_700_000_000,
            "statistics": {"diggCount": 10, "commentCount": "5", "shareCount": 2, "collectCount": 1},
            "authorMeta": {"secUid": "MS4w", "name": "creator"}
        });

        let video = video_from_item(&item);

        assert_eq!(video.aweme_id, "7301");
        assert_eq!(video.creator_sec_uid, "MS4w");
        assert_eq!(video.creator_name.as_deref(), Some("creator"));
        assert_eq!(video.engagement.comments, 5);
        assert_eq!(video.created_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(video.follower_count, None);
    }

    #[test]
    fn tolerates_missing_sections() {
        let video = video_from_item(&json!({}));
        assert!(video.creator_sec_uid.is_empty());
        assert_eq!(video.engagement, EngagementCounts::default());
        assert!(video.created_at.is_none());
    }
}
