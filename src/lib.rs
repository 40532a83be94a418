pub mod apify_client;
pub mod collaborators;
pub mod config;
pub mod douyin_client;
pub mod error;
pub mod google;
pub mod progress;
pub mod scoring;
pub mod sheet_table;
pub mod workflows;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use error::{CollaboratorError, ConfigError, ScoreError, WorkflowError};
pub use scoring::{
    filter_new_creators, rank_creators, rank_videos, score_videos, virality_velocity,
    CreatorRankEntry, RankingMetric, ScoredVideo, ViralityBreakdown, ViralityScorer,
};

pub const DOUYIN_USER_URL: &str = "https://www.douyin.com/user/";
pub const DOUYIN_VIDEO_URL: &str = "https://www.douyin.com/video/";

/// Raw engagement counters of one video. Every field defaults to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    #[serde(default, deserialize_with = "deserialize_count")]
    pub likes: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub comments: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub shares: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub collects: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub recommends: u64,
}

/// One video as delivered by a video source, before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetric {
    #[serde(default)]
    pub aweme_id: String,
    #[serde(default)]
    pub creator_sec_uid: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub engagement: EngagementCounts,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    pub follower_count: Option<u64>,
}

impl VideoMetric {
    pub fn new(aweme_id: impl Into<String>, creator_sec_uid: impl Into<String>) -> Self {
        Self {
            aweme_id: aweme_id.into(),
            creator_sec_uid: creator_sec_uid.into(),
            ..Self::default()
        }
    }

    pub fn with_engagement(mut self, engagement: EngagementCounts) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_follower_count(mut self, follower_count: u64) -> Self {
        self.follower_count = Some(follower_count);
        self
    }

    pub fn account_link(&self) -> String {
        creator_link(&self.creator_sec_uid)
    }

    pub fn video_url(&self) -> String {
        format!("{}{}", DOUYIN_VIDEO_URL, self.aweme_id)
    }
}

pub fn creator_link(sec_uid: &str) -> String {
    format!("{}{}", DOUYIN_USER_URL, sec_uid)
}

/// Coerces a loosely typed JSON value into a non-negative count.
///
/// Negative, non-finite and non-numeric values become 0; numeric strings are
/// parsed and fractional values are floored.
pub fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                unsigned
            } else if let Some(float) = number.as_f64() {
                float_to_count(float)
            } else {
                0
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(unsigned) = trimmed.parse::<u64>() {
                unsigned
            } else {
                trimmed.parse::<f64>().map(float_to_count).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

/// Like [`count_from_value`], but keeps "unknown" apart from zero.
pub fn optional_count_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::Number(_) | Value::String(_) => Some(count_from_value(value)),
        _ => None,
    }
}

/// Converts a unix timestamp in seconds; zero and out-of-range values are absent.
pub fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = count_from_value(value);
    if seconds == 0 {
        return None;
    }
    let seconds = i64::try_from(seconds).ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

fn float_to_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u64::MAX as f64) as u64
    } else {
        0
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

fn deserialize_optional_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(optional_count_from_value(&value))
}

pub fn format_number(value: u64) -> String {
    let mut chars: Vec<char> = value.to_string().chars().collect();
    let mut result = String::new();
    let mut count = 0usize;

    while let Some(ch) = chars.pop() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(ch);
        count += 1;
    }

    result.chars().rev().collect()
}

pub fn format_float(value: f64, digits: usize) -> String {
    format!("{:.1$}", value, digits)
}

pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_coerce_invalid_values_to_zero() {
        assert_eq!(count_from_value(&json!(-5)), 0);
        assert_eq!(count_from_value(&json!("abc")), 0);
        assert_eq!(count_from_value(&json!(null)), 0);
        assert_eq!(count_from_value(&json!(true)), 0);
        assert_eq!(count_from_value(&json!(12.9)), 12);
        assert_eq!(count_from_value(&json!(" 42 ")), 42);
    }

    #[test]
    fn follower_count_keeps_unknown_apart_from_zero() {
        assert_eq!(optional_count_from_value(&json!(null)), None);
        assert_eq!(optional_count_from_value(&json!("")), None);
        assert_eq!(optional_count_from_value(&json!(0)), Some(0));
        assert_eq!(optional_count_from_value(&json!("1500")), Some(1500));
    }

    #[test]
    fn video_metric_deserializes_with_missing_and_invalid_fields() {
        let video: VideoMetric = serde_json::from_value(json!({
            "aweme_id": "v1",
            "creator_sec_uid": "c1",
            "likes": -3,
            "comments": "7",
            "shares": null
        }))
        .unwrap();

        assert_eq!(video.engagement.likes, 0);
        assert_eq!(video.engagement.comments, 7);
        assert_eq!(video.engagement.shares, 0);
        assert_eq!(video.engagement.recommends, 0);
        assert_eq!(video.follower_count, None);
        assert!(video.created_at.is_none());
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
