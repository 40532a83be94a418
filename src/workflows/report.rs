use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::collaborators::{CreatorDirectory, SpreadsheetStore};
use crate::error::WorkflowError;
use crate::google::spreadsheet_url;
use crate::scoring::{rank_by_score, ScoredVideo};
use crate::sheet_table::{
    SheetTable, COL_ACCOUNT_LINK, COL_CREATOR_NAME, COL_CREATOR_SEC_UID, COL_FOLLOWER_COUNT,
};
use crate::workflows::discover::require;
use crate::workflows::WorkflowContext;
use crate::{creator_link, round_to};

pub const REPORT_HEADERS: [&str; 15] = [
    "Creator Name",
    "Creator SecUid",
    "Account Link",
    "Follower Count",
    "Video ID",
    "Video URL",
    "Description",
    "Create Timestamp",
    "Create Date",
    "Likes",
    "Comments",
    "Shares",
    "Bookmarks",
    "Recommendations",
    "Virality Score",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    pub message: String,
    pub videos_processed: usize,
    pub report_sheet_url: String,
}

/// One line of the generated report sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub creator_name: String,
    pub creator_sec_uid: String,
    pub account_link: String,
    pub follower_count: u64,
    pub video_id: String,
    pub video_url: String,
    pub description: String,
    pub create_timestamp: i64,
    pub create_date: String,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub bookmarks: u64,
    pub recommendations: u64,
    pub virality_score: f64,
}

impl ReportRow {
    fn from_scored(scored: &ScoredVideo, creator: &CreatorInfo, ctx: &WorkflowContext<'_>) -> Self {
        let video = &scored.video;
        let created_at = video.created_at.unwrap_or(ctx.now);
        Self {
            creator_name: creator.name.clone(),
            creator_sec_uid: video.creator_sec_uid.clone(),
            account_link: creator.account_link.clone(),
            follower_count: creator.follower_count,
            video_id: video.aweme_id.clone(),
            video_url: video.video_url(),
            description: video.description.clone().unwrap_or_default(),
            create_timestamp: created_at.timestamp(),
            create_date: created_at.format("%Y-%m-%d").to_string(),
            likes: video.engagement.likes,
            comments: video.engagement.comments,
            shares: video.engagement.shares,
            bookmarks: video.engagement.collects,
            recommendations: video.engagement.recommends,
            virality_score: round_to(scored.virality_score.unwrap_or(0.0), 4),
        }
    }

    pub fn to_cells(&self) -> Vec<Value> {
        vec![
            Value::from(self.creator_name.clone()),
            Value::from(self.creator_sec_uid.clone()),
            Value::from(self.account_link.clone()),
            Value::from(self.follower_count),
            Value::from(self.video_id.clone()),
            Value::from(self.video_url.clone()),
            Value::from(self.description.clone()),
            Value::from(self.create_timestamp),
            Value::from(self.create_date.clone()),
            Value::from(self.likes),
            Value::from(self.comments),
            Value::from(self.shares),
            Value::from(self.bookmarks),
            Value::from(self.recommendations),
            Value::from(self.virality_score),
        ]
    }
}

struct CreatorInfo {
    name: String,
    account_link: String,
    follower_count: u64,
}

/// Scores the recent videos of the most recently listed creators and writes
/// them, best first, to a new timestamped sheet.
pub async fn generate_report(
    ctx: &WorkflowContext<'_>,
    directory: &dyn CreatorDirectory,
    sheets: &dyn SpreadsheetStore,
    request: ReportRequest,
) -> Result<ReportResponse, WorkflowError> {
    require("spreadsheet_id", &request.spreadsheet_id)?;
    require("sheet_name", &request.sheet_name)?;

    let values = sheets
        .get_values(&request.spreadsheet_id, &request.sheet_name)
        .await
        .map_err(|err| WorkflowError::storage("failed to read creator sheet", err))?;
    let records = SheetTable::from_values(values).records();
    if records.is_empty() {
        return Err(WorkflowError::NotFound(
            "The source sheet contains no user data.".to_string(),
        ));
    }

    let max_users = ctx.config.report.max_users;
    let selected = &records[records.len().saturating_sub(max_users)..];
    info!(count = selected.len(), "selected most recent creators for analysis");
    ctx.emit("fetching", &format!("Fetching videos for {} creators", selected.len()));

    // Videos point at the sheet row they were scored with; secUids may repeat.
    let mut creators: Vec<CreatorInfo> = Vec::new();
    let mut scored: Vec<(ScoredVideo, usize)> = Vec::new();

    for record in selected {
        let field = |name: &str| record.get(name).map(|value| value.trim()).unwrap_or("");
        let sec_uid = field(COL_CREATOR_SEC_UID);
        let name = field(COL_CREATOR_NAME);
        let followers = parse_follower_cell(field(COL_FOLLOWER_COUNT)).filter(|count| *count > 0);

        let Some(follower_count) = followers.filter(|_| !sec_uid.is_empty()) else {
            warn!(creator = name, "skipping creator without secUid or follower count");
            continue;
        };

        info!(creator = name, sec_uid, "processing creator");
        let videos = match directory
            .recent_videos(sec_uid, ctx.config.report.videos_per_user)
            .await
        {
            Ok(videos) => videos,
            Err(err) => {
                error!(sec_uid, error = %err, "failed to fetch recent videos");
                continue;
            }
        };

        let account_link = match field(COL_ACCOUNT_LINK) {
            "" => creator_link(sec_uid),
            link => link.to_string(),
        };
        let creator = creators.len();
        creators.push(CreatorInfo {
            name: name.to_string(),
            account_link,
            follower_count,
        });

        for mut video in videos {
            video.creator_sec_uid = sec_uid.to_string();
            video.follower_count = Some(follower_count);
            scored.push((ctx.scorer.score_video(video, ctx.now), creator));
        }
    }

    ctx.emit("scoring", &format!("Ranking {} videos", scored.len()));
    let rows: Vec<ReportRow> = rank_by_score(scored, |(video, _)| video.virality_score)
        .iter()
        .map(|(video, creator)| ReportRow::from_scored(video, &creators[*creator], ctx))
        .collect();

    if rows.is_empty() {
        return Err(WorkflowError::NotFound(
            "Could not fetch or process any videos for the selected users.".to_string(),
        ));
    }

    ctx.emit("writing", "Writing report sheet");
    let title = ctx.timestamped("VideoReport");
    let sheet = sheets
        .add_sheet(&request.spreadsheet_id, &title, rows.len() + 1, REPORT_HEADERS.len())
        .await
        .map_err(|err| WorkflowError::storage("failed to create report sheet", err))?;

    let mut cells: Vec<Vec<Value>> = Vec::with_capacity(rows.len() + 1);
    cells.push(REPORT_HEADERS.iter().map(|header| Value::from(*header)).collect());
    cells.extend(rows.iter().map(ReportRow::to_cells));
    sheets
        .write_rows(&request.spreadsheet_id, &sheet.title, "A1", cells)
        .await
        .map_err(|err| WorkflowError::storage("failed to write the report", err))?;

    let report_sheet_url = spreadsheet_url(&request.spreadsheet_id, sheet.sheet_id);
    info!(url = %report_sheet_url, "created report sheet");
    ctx.emit("done", "Report complete");

    Ok(ReportResponse {
        message: "Successfully generated video virality report.".to_string(),
        videos_processed: rows.len(),
        report_sheet_url,
    })
}

/// Follower cells may be formatted (`12,345`) or fractional (`12345.0`).
pub fn parse_follower_cell(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(value) = cleaned.parse::<u64>() {
        return Some(value);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| value.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follower_cells_accept_formatted_numbers() {
        assert_eq!(parse_follower_cell("12,345"), Some(12_345));
        assert_eq!(parse_follower_cell(" 900 "), Some(900));
        assert_eq!(parse_follower_cell("1500.0"), Some(1500));
        assert_eq!(parse_follower_cell(""), None);
        assert_eq!(parse_follower_cell("n/a"), None);
        assert_eq!(parse_follower_cell("-3"), None);
    }
}
