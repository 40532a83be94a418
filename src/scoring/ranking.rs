use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::scoring::ScoredVideo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMetric {
    Velocity,
    ViralityScore,
}

impl RankingMetric {
    pub fn value(self, video: &ScoredVideo) -> Option<f64> {
        match self {
            RankingMetric::Velocity => Some(video.virality_velocity),
            RankingMetric::ViralityScore => video.virality_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatorRankEntry {
    pub sec_uid: String,
    pub display_name: Option<String>,
    pub best_score: f64,
    pub best_aweme_id: String,
    pub video_count: usize,
}

/// Distinct creators by their best video, highest first, at most `limit`.
///
/// Creators with equal best scores keep the order in which they first
/// appear in `videos`. Videos without a creator id or without the metric
/// are ignored.
pub fn rank_creators(
    videos: &[ScoredVideo],
    metric: RankingMetric,
    limit: usize,
) -> Vec<CreatorRankEntry> {
    if limit == 0 {
        return Vec::new();
    }

    let mut entries: Vec<CreatorRankEntry> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for video in videos {
        let sec_uid = video.sec_uid();
        if sec_uid.is_empty() {
            continue;
        }
        let Some(score) = metric.value(video).filter(|score| !score.is_nan()) else {
            continue;
        };

        match positions.get(sec_uid) {
            Some(&index) => {
                let entry = &mut entries[index];
                entry.video_count += 1;
                if score > entry.best_score {
                    entry.best_score = score;
                    entry.best_aweme_id = video.video.aweme_id.clone();
                }
                if entry.display_name.is_none() {
                    entry.display_name = video.video.creator_name.clone();
                }
            }
            None => {
                positions.insert(sec_uid, entries.len());
                entries.push(CreatorRankEntry {
                    sec_uid: sec_uid.to_string(),
                    display_name: video.video.creator_name.clone(),
                    best_score: score,
                    best_aweme_id: video.video.aweme_id.clone(),
                    video_count: 1,
                });
            }
        }
    }

    // sort_by is stable, so ties stay in first-appearance order.
    entries.sort_by(|a, b| b.best_score.total_cmp(&a.best_score));
    entries.truncate(limit);
    entries
}

/// Candidates whose id is not already present, in rank order, without repeats.
pub fn filter_new_creators(
    candidates: &[CreatorRankEntry],
    existing: &HashSet<String>,
) -> Vec<CreatorRankEntry> {
    let mut seen: HashSet<&str> = HashSet::new();
    candidates
        .iter()
        .filter(|candidate| !existing.contains(&candidate.sec_uid))
        .filter(|candidate| seen.insert(candidate.sec_uid.as_str()))
        .cloned()
        .collect()
}

/// Videos with a composite score, highest first; ties keep input order.
pub fn rank_videos(videos: Vec<ScoredVideo>) -> Vec<ScoredVideo> {
    rank_by_score(videos, |video| video.virality_score)
}

/// Keeps items that have a score and sorts them highest first. The sort is
/// stable, so tied items stay in input order.
pub fn rank_by_score<T>(items: Vec<T>, score_of: impl Fn(&T) -> Option<f64>) -> Vec<T> {
    let mut ranked: Vec<(f64, T)> = items
        .into_iter()
        .filter_map(|item| score_of(&item).filter(|score| !score.is_nan()).map(|score| (score, item)))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().map(|(_, item)| item).collect()
}
