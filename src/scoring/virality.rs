use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::scoring::VelocityScorer;
use crate::EngagementCounts;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
    pub collects: f64,
    pub recommends: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            likes: 0.3,
            comments: 1.8,
            shares: 2.5,
            collects: 1.2,
            recommends: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub velocity: f64,
    pub engagement_ratio: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            velocity: 0.4,
            engagement_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViralityBreakdown {
    pub velocity: f64,
    pub engagement_ratio: f64,
    pub score: f64,
}

/// Blends velocity with engagement relative to audience size.
#[derive(Debug, Clone, Default)]
pub struct ViralityScorer {
    velocity: VelocityScorer,
    engagement: EngagementWeights,
    blend: BlendWeights,
}

impl ViralityScorer {
    pub fn new(velocity: VelocityScorer, engagement: EngagementWeights, blend: BlendWeights) -> Self {
        Self {
            velocity,
            engagement,
            blend,
        }
    }

    pub fn velocity_scorer(&self) -> &VelocityScorer {
        &self.velocity
    }

    pub fn detailed_engagement(&self, counts: &EngagementCounts) -> f64 {
        counts.likes as f64 * self.engagement.likes
            + counts.comments as f64 * self.engagement.comments
            + counts.shares as f64 * self.engagement.shares
            + counts.collects as f64 * self.engagement.collects
            + counts.recommends as f64 * self.engagement.recommends
    }

    /// `ln(followers + 1)` is zero for zero followers, so that case has no ratio.
    pub fn engagement_ratio(
        &self,
        counts: &EngagementCounts,
        follower_count: Option<u64>,
    ) -> Result<f64, ScoreError> {
        let followers = follower_count.ok_or(ScoreError::MissingFollowerCount)?;
        if followers == 0 {
            return Err(ScoreError::UndefinedRatio);
        }
        let audience = (followers as f64 + 1.0).ln();
        Ok(self.detailed_engagement(counts) / audience)
    }

    pub fn score(
        &self,
        counts: &EngagementCounts,
        age_hours: f64,
        follower_count: Option<u64>,
    ) -> Result<ViralityBreakdown, ScoreError> {
        let engagement_ratio = self.engagement_ratio(counts, follower_count)?;
        let velocity = self.velocity.score(counts, age_hours);
        let score = self.blend.velocity * velocity + self.blend.engagement_ratio * engagement_ratio;
        Ok(ViralityBreakdown {
            velocity,
            engagement_ratio,
            score,
        })
    }
}
