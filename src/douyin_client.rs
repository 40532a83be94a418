use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::collaborators::CreatorDirectory;
use crate::config::RapidApiConfig;
use crate::error::CollaboratorError;
use crate::{count_from_value, optional_count_from_value, timestamp_from_value, EngagementCounts, VideoMetric};

const SERVICE: &str = "rapidapi";

const USER_DETAIL_PATH: &str = "/v1/social/douyin/web/user/detail";
const USER_POSTS_PATH: &str = "/v1/social/douyin/web/aweme/post";
const VIDEO_DETAIL_PATH: &str = "/v1/social/douyin/web/aweme/detail";

/// Douyin media endpoints published on RapidAPI.
#[derive(Clone)]
pub struct DouyinClient {
    client: reqwest::Client,
    base_url: String,
    host: String,
    api_key: String,
    user_timeout: Duration,
    detail_timeout: Duration,
    download_timeout: Duration,
}

impl DouyinClient {
    pub fn from_config(config: &RapidApiConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            host: config.host.clone(),
            api_key,
            user_timeout: Duration::from_secs(config.user_timeout_secs),
            detail_timeout: Duration::from_secs(config.detail_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        }
    }

    async fn post(&self, path: &str, payload: Value, timeout: Duration) -> Result<Value, CollaboratorError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::upstream(SERVICE, status.as_u16(), &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))
    }
}

#[async_trait]
impl CreatorDirectory for DouyinClient {
    async fn follower_count(&self, sec_uid: &str) -> Result<Option<u64>, CollaboratorError> {
        let body = self
            .post(USER_DETAIL_PATH, json!({ "sec_user_id": sec_uid }), self.user_timeout)
            .await?;
        let followers = optional_count_from_value(&body["user"]["follower_count"]);
        if followers.is_none() {
            warn!(sec_uid, "user detail response has no follower count");
        }
        Ok(followers)
    }

    async fn recent_videos(
        &self,
        sec_uid: &str,
        count: u32,
    ) -> Result<Vec<VideoMetric>, CollaboratorError> {
        let body = self
            .post(
                USER_POSTS_PATH,
                json!({ "sec_user_id": sec_uid, "count": count, "max_cursor": "0" }),
                self.download_timeout,
            )
            .await?;
        let videos = body["aweme_list"]
            .as_array()
            .map(|items| items.iter().map(|item| video_from_aweme(item, sec_uid)).collect())
            .unwrap_or_default();
        Ok(videos)
    }

    async fn download_url(&self, aweme_id: &str) -> Result<String, CollaboratorError> {
        info!(aweme_id, "fetching download details");
        let body = self
            .post(VIDEO_DETAIL_PATH, json!({ "id": aweme_id }), self.detail_timeout)
            .await?;
        play_url(&body["aweme_detail"]).ok_or_else(|| {
            CollaboratorError::parse(SERVICE, "download link not found in the response")
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, CollaboratorError> {
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|err| CollaboratorError::transport("video download", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::upstream("video download", status.as_u16(), ""));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| CollaboratorError::transport("video download", err))?;
        Ok(bytes.to_vec())
    }
}

/// Maps one entry of `aweme_list`.
pub fn video_from_aweme(item: &Value, sec_uid: &str) -> VideoMetric {
    let stats = &item["statistics"];
    let aweme_id = match &item["aweme_id"] {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    };

    VideoMetric {
        aweme_id,
        creator_sec_uid: sec_uid.to_string(),
        creator_name: item["author"]["nickname"].as_str().map(str::to_string),
        description: item["desc"].as_str().map(str::to_string),
        engagement: EngagementCounts {
            likes: count_from_value(&stats["digg_count"]),
            comments: count_from_value(&stats["comment_count"]),
            shares: count_from_value(&stats["share_count"]),
            collects: count_from_value(&stats["collect_count"]),
            recommends: count_from_value(&stats["recommend_count"]),
        },
        created_at: timestamp_from_value(&item["create_time"]),
        follower_count: None,
    }
}

fn play_url(detail: &Value) -> Option<String> {
    detail["video"]["play_addr"]["url_list"]
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|url| !url.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_aweme_entry() {
        let item = json!({
            "aweme_id": "7401",
            "desc": "dance",
            "create_time": 1_700_003_600,
            "statistics": {
                "digg_count": 100,
                "comment_count": 20,
                "share_count": 5,
                "collect_count": 3,
                "recommend_count": 1
            }
        });

        let video = video_from_aweme(&item, "uid-1");

        assert_eq!(video.aweme_id, "7401");
        assert_eq!(video.creator_sec_uid, "uid-1");
        assert_eq!(video.engagement.recommends, 1);
        assert_eq!(video.description.as_deref(), Some("dance"));
    }

    #[test]
    fn play_url_requires_a_non_empty_entry() {
        assert_eq!(play_url(&json!({})), None);
        assert_eq!(play_url(&json!({"video": {"play_addr": {"url_list": []}}})), None);
        assert_eq!(
            play_url(&json!({"video": {"play_addr": {"url_list": ["", "https://cdn/v.mp4"]}}})),
            Some("https://cdn/v.mp4".to_string())
        );
    }
}
