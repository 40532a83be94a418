use chrono::{Duration, TimeZone, Utc};
use std::collections::HashSet;

use douyin_virality::scoring::{
    EngagementWeights, VelocityScorer, VelocityWeights, MIN_AGE_FLOOR_HOURS,
};
use douyin_virality::{
    filter_new_creators, rank_creators, rank_videos, score_videos, virality_velocity,
    CreatorRankEntry, EngagementCounts, RankingMetric, ScoreError, VideoMetric, ViralityScorer,
};

fn counts(likes: u64, comments: u64, shares: u64, collects: u64) -> EngagementCounts {
    EngagementCounts {
        likes,
        comments,
        shares,
        collects,
        recommends: 0,
    }
}

fn video(aweme_id: &str, sec_uid: &str, engagement: EngagementCounts, age_hours: i64) -> VideoMetric {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    VideoMetric::new(aweme_id, sec_uid)
        .with_engagement(engagement)
        .with_created_at(now - Duration::hours(age_hours))
}

fn clock() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[test]
fn velocity_matches_worked_example() {
    let velocity = virality_velocity(&counts(10, 5, 2, 1), 2.0);
    assert!((velocity - 8.75).abs() < 1e-9);
}

#[test]
fn velocity_floors_young_videos_at_one_hour() {
    let engagement = counts(10, 5, 2, 1);
    let fresh = virality_velocity(&engagement, 0.0);
    let negative = virality_velocity(&engagement, -3.0);
    assert!((fresh - 17.5).abs() < 1e-9);
    assert!((negative - 17.5).abs() < 1e-9);
}

#[test]
fn configured_floor_never_drops_below_one_minute() {
    let scorer = VelocityScorer::new(VelocityWeights::default(), 0.001);
    assert!((scorer.min_age_hours() - MIN_AGE_FLOOR_HOURS).abs() < 1e-12);

    let velocity = scorer.score(&counts(10, 5, 2, 1), 0.0);
    assert!((velocity - 17.5 * 60.0).abs() < 1e-6);

    let negative = VelocityScorer::new(VelocityWeights::default(), -2.0);
    assert!((negative.min_age_hours() - MIN_AGE_FLOOR_HOURS).abs() < 1e-12);
}

#[test]
fn future_timestamps_collapse_to_the_floor() {
    let scorer = VelocityScorer::default();
    let future = clock() + Duration::hours(5);
    assert!((scorer.age_hours(Some(future), clock()) - 1.0).abs() < 1e-12);

    let scored = score_videos(
        &ViralityScorer::default(),
        vec![VideoMetric::new("v1", "alice")
            .with_engagement(counts(10, 5, 2, 1))
            .with_created_at(future)],
        clock(),
    );
    assert!((scored[0].age_hours - 1.0).abs() < 1e-12);
    assert!((scored[0].virality_velocity - 17.5).abs() < 1e-9);
}

#[test]
fn velocity_grows_with_engagement_and_shrinks_with_age() {
    let base = virality_velocity(&counts(10, 5, 2, 1), 4.0);
    let more_likes = virality_velocity(&counts(11, 5, 2, 1), 4.0);
    let older = virality_velocity(&counts(10, 5, 2, 1), 8.0);
    assert!(more_likes > base);
    assert!(older < base);
}

#[test]
fn composite_score_blends_velocity_and_ratio() {
    let scorer = ViralityScorer::default();
    let engagement = EngagementCounts {
        likes: 100,
        comments: 10,
        shares: 5,
        collects: 2,
        recommends: 1,
    };

    let breakdown = scorer.score(&engagement, 2.0, Some(1000)).unwrap();
    let weights = EngagementWeights::default();
    let detailed = 100.0 * weights.likes
        + 10.0 * weights.comments
        + 5.0 * weights.shares
        + 2.0 * weights.collects
        + 1.0 * weights.recommends;
    let ratio = detailed / 1001f64.ln();
    let velocity = virality_velocity(&engagement, 2.0);

    assert!((breakdown.engagement_ratio - ratio).abs() < 1e-9);
    assert!((breakdown.score - (0.4 * velocity + 0.6 * ratio)).abs() < 1e-9);
}

#[test]
fn zero_followers_have_no_composite_score() {
    let scorer = ViralityScorer::default();
    let engagement = counts(10, 5, 2, 1);

    assert_eq!(
        scorer.score(&engagement, 2.0, Some(0)).unwrap_err(),
        ScoreError::UndefinedRatio
    );
    assert_eq!(
        scorer.score(&engagement, 2.0, None).unwrap_err(),
        ScoreError::MissingFollowerCount
    );

    let scored = score_videos(
        &scorer,
        vec![video("v1", "alice", engagement, 2).with_follower_count(0)],
        clock(),
    );
    assert_eq!(scored[0].virality_score, None);
    assert_eq!(scored[0].score_error, Some(ScoreError::UndefinedRatio));
    assert!((scored[0].virality_velocity - 8.75).abs() < 1e-9);
    assert!(rank_videos(scored).is_empty());
}

#[test]
fn scoring_is_repeatable_for_a_fixed_clock() {
    let scorer = ViralityScorer::default();
    let videos = vec![
        video("v1", "alice", counts(10, 5, 2, 1), 2).with_follower_count(500),
        video("v2", "bob", counts(40, 1, 0, 0), 10).with_follower_count(20_000),
    ];

    let first = score_videos(&scorer, videos.clone(), clock());
    let second = score_videos(&scorer, videos, clock());
    assert_eq!(first, second);
}

#[test]
fn creators_rank_by_best_video_without_duplicates() {
    let scorer = ViralityScorer::default();
    let videos = vec![
        video("a1", "alice", counts(10, 0, 0, 0), 1),
        video("b1", "bob", counts(100, 0, 0, 0), 1),
        video("a2", "alice", counts(400, 0, 0, 0), 1),
        video("c1", "carol", counts(20, 0, 0, 0), 1),
    ];
    let scored = score_videos(&scorer, videos, clock());

    let ranked = rank_creators(&scored, RankingMetric::Velocity, 10);
    let ids: Vec<&str> = ranked.iter().map(|entry| entry.sec_uid.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob", "carol"]);
    assert_eq!(ranked[0].best_aweme_id, "a2");
    assert_eq!(ranked[0].video_count, 2);
    assert!((ranked[0].best_score - 200.0).abs() < 1e-9);
}

#[test]
fn tied_creators_keep_input_order() {
    let scorer = ViralityScorer::default();
    let videos = vec![
        video("z1", "zed", counts(10, 5, 2, 1), 2),
        video("a1", "amy", counts(10, 5, 2, 1), 2),
    ];
    let scored = score_videos(&scorer, videos, clock());

    let ranked = rank_creators(&scored, RankingMetric::Velocity, 5);
    assert_eq!(ranked[0].sec_uid, "zed");
    assert_eq!(ranked[1].sec_uid, "amy");
    assert!((ranked[0].best_score - 8.75).abs() < 1e-9);
    assert!((ranked[1].best_score - 8.75).abs() < 1e-9);
}

#[test]
fn ranking_truncates_to_k_and_handles_empty_input() {
    let scorer = ViralityScorer::default();
    let videos: Vec<VideoMetric> = (0..5)
        .map(|index| {
            video(
                &format!("v{}", index),
                &format!("creator-{}", index),
                counts(10 * (index + 1), 0, 0, 0),
                1,
            )
        })
        .collect();
    let scored = score_videos(&scorer, videos, clock());

    let top = rank_creators(&scored, RankingMetric::Velocity, 2);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].sec_uid, "creator-4");
    assert!(rank_creators(&scored, RankingMetric::Velocity, 0).is_empty());
    assert!(rank_creators(&[], RankingMetric::Velocity, 5).is_empty());
}

#[test]
fn score_ranking_skips_creators_without_followers() {
    let scorer = ViralityScorer::default();
    let videos = vec![
        video("a1", "alice", counts(500, 0, 0, 0), 1),
        video("b1", "bob", counts(10, 0, 0, 0), 1).with_follower_count(100),
    ];
    let scored = score_videos(&scorer, videos, clock());

    let ranked = rank_creators(&scored, RankingMetric::ViralityScore, 5);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].sec_uid, "bob");
}

#[test]
fn new_creator_filter_is_an_ordered_set_difference() {
    let scorer = ViralityScorer::default();
    let videos = vec![
        video("a1", "alice", counts(300, 0, 0, 0), 1),
        video("b1", "bob", counts(200, 0, 0, 0), 1),
        video("c1", "carol", counts(100, 0, 0, 0), 1),
    ];
    let ranked = rank_creators(&score_videos(&scorer, videos, clock()), RankingMetric::Velocity, 3);
    let existing: HashSet<String> = ["bob".to_string()].into_iter().collect();

    let fresh = filter_new_creators(&ranked, &existing);
    let ids: Vec<&str> = fresh.iter().map(|entry| entry.sec_uid.as_str()).collect();
    assert_eq!(ids, vec!["alice", "carol"]);

    let everyone: HashSet<String> = ranked.iter().map(|entry| entry.sec_uid.clone()).collect();
    assert!(filter_new_creators(&ranked, &everyone).is_empty());
    assert!(filter_new_creators(&[], &existing).is_empty());
}

#[test]
fn lenient_counts_parse_from_scraper_json() {
    let videos: Vec<VideoMetric> = serde_json::from_str(
        r#"[
            {"aweme_id": "v1", "creator_sec_uid": "alice", "likes": "12", "comments": -4,
             "shares": 2.0, "collects": null, "follower_count": "1,500"}
        ]"#,
    )
    .unwrap();

    assert_eq!(videos[0].engagement.likes, 12);
    assert_eq!(videos[0].engagement.comments, 0);
    assert_eq!(videos[0].engagement.shares, 2);
    assert_eq!(videos[0].engagement.collects, 0);
    assert_eq!(videos[0].engagement.recommends, 0);
}

fn entry(sec_uid: &str, best_score: f64) -> CreatorRankEntry {
    CreatorRankEntry {
        sec_uid: sec_uid.to_string(),
        display_name: None,
        best_score,
        best_aweme_id: format!("{}-video", sec_uid),
        video_count: 1,
    }
}

#[test]
fn new_creator_filter_drops_repeated_candidates() {
    let candidates = vec![
        entry("alice", 9.0),
        entry("bob", 8.0),
        entry("alice", 7.0),
        entry("carol", 6.0),
        entry("bob", 5.0),
    ];
    let existing: HashSet<String> = ["carol".to_string()].into_iter().collect();

    let fresh = filter_new_creators(&candidates, &existing);
    let ids: Vec<&str> = fresh.iter().map(|entry| entry.sec_uid.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
    assert!((fresh[0].best_score - 9.0).abs() < 1e-12);
}
