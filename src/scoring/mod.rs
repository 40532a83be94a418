pub mod pipeline;
pub mod ranking;
pub mod velocity;
pub mod virality;

pub use pipeline::{score_videos, ScoredVideo};
pub use ranking::{
    filter_new_creators, rank_by_score, rank_creators, rank_videos, CreatorRankEntry, RankingMetric,
};
pub use velocity::{virality_velocity, VelocityScorer, VelocityWeights, MIN_AGE_FLOOR_HOURS};
pub use virality::{BlendWeights, EngagementWeights, ViralityBreakdown, ViralityScorer};
