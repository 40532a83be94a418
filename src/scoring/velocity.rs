use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EngagementCounts;

/// Lowest age a video can have, whatever the configured floor says.
pub const MIN_AGE_FLOOR_HOURS: f64 = 1.0 / 60.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityWeights {
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
    pub collects: f64,
}

impl Default for VelocityWeights {
    fn default() -> Self {
        Self {
            likes: 0.5,
            comments: 1.5,
            shares: 2.0,
            collects: 1.0,
        }
    }
}

/// Weighted engagement per hour of video age.
#[derive(Debug, Clone)]
pub struct VelocityScorer {
    weights: VelocityWeights,
    min_age_hours: f64,
}

impl Default for VelocityScorer {
    fn default() -> Self {
        Self::new(VelocityWeights::default(), 1.0)
    }
}

impl VelocityScorer {
    pub fn new(weights: VelocityWeights, min_age_hours: f64) -> Self {
        Self {
            weights,
            min_age_hours: effective_floor(min_age_hours),
        }
    }

    pub fn min_age_hours(&self) -> f64 {
        self.min_age_hours
    }

    pub fn weighted_engagement(&self, counts: &EngagementCounts) -> f64 {
        counts.likes as f64 * self.weights.likes
            + counts.comments as f64 * self.weights.comments
            + counts.shares as f64 * self.weights.shares
            + counts.collects as f64 * self.weights.collects
    }

    pub fn score(&self, counts: &EngagementCounts, age_hours: f64) -> f64 {
        let age = self.floor_age(age_hours);
        let velocity = self.weighted_engagement(counts) / age;
        velocity.max(0.0)
    }

    /// Hours between `created_at` and `now`, floored. A missing timestamp counts as brand new.
    pub fn age_hours(&self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let elapsed = created_at
            .map(|created| (now - created).num_seconds() as f64 / 3600.0)
            .unwrap_or(0.0);
        self.floor_age(elapsed)
    }

    fn floor_age(&self, age_hours: f64) -> f64 {
        if age_hours.is_finite() && age_hours > self.min_age_hours {
            age_hours
        } else {
            self.min_age_hours
        }
    }
}

/// Velocity with the default weights and a one hour floor.
pub fn virality_velocity(counts: &EngagementCounts, age_hours: f64) -> f64 {
    VelocityScorer::default().score(counts, age_hours)
}

fn effective_floor(configured: f64) -> f64 {
    if configured.is_finite() && configured > MIN_AGE_FLOOR_HOURS {
        configured
    } else {
        MIN_AGE_FLOOR_HOURS
    }
}
