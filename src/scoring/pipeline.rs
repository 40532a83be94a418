use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::ScoringSection;
use crate::error::ScoreError;
use crate::scoring::{VelocityScorer, ViralityScorer};
use crate::VideoMetric;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredVideo {
    #[serde(flatten)]
    pub video: VideoMetric,
    pub age_hours: f64,
    pub virality_velocity: f64,
    pub engagement_ratio: Option<f64>,
    pub virality_score: Option<f64>,
    #[serde(skip)]
    pub score_error: Option<ScoreError>,
}

impl ScoredVideo {
    pub fn sec_uid(&self) -> &str {
        &self.video.creator_sec_uid
    }
}

impl ViralityScorer {
    pub fn from_config(config: &ScoringSection) -> Self {
        ViralityScorer::new(
            VelocityScorer::new(config.velocity.clone(), config.min_age_hours),
            config.engagement.clone(),
            config.blend.clone(),
        )
    }

    /// Scores one video against a fixed clock. The composite score is only
    /// filled in when the follower count makes the ratio defined.
    pub fn score_video(&self, video: VideoMetric, now: DateTime<Utc>) -> ScoredVideo {
        let age_hours = self.velocity_scorer().age_hours(video.created_at, now);
        let virality_velocity = self.velocity_scorer().score(&video.engagement, age_hours);

        let (engagement_ratio, virality_score, score_error) =
            match self.score(&video.engagement, age_hours, video.follower_count) {
                Ok(breakdown) => (Some(breakdown.engagement_ratio), Some(breakdown.score), None),
                Err(err) => {
                    debug!(aweme_id = %video.aweme_id, error = %err, "composite score unavailable");
                    (None, None, Some(err))
                }
            };

        ScoredVideo {
            video,
            age_hours,
            virality_velocity,
            engagement_ratio,
            virality_score,
            score_error,
        }
    }
}

pub fn score_videos(
    scorer: &ViralityScorer,
    videos: Vec<VideoMetric>,
    now: DateTime<Utc>,
) -> Vec<ScoredVideo> {
    videos
        .into_iter()
        .map(|video| scorer.score_video(video, now))
        .collect()
}
