use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::collaborators::{SpreadsheetStore, VideoSearch};
use crate::error::{CollaboratorError, WorkflowError};
use crate::scoring::{filter_new_creators, rank_creators, score_videos, RankingMetric};
use crate::sheet_table::{SheetTable, COL_CREATOR_SEC_UID, CREATOR_HEADERS};
use crate::workflows::WorkflowContext;
use crate::creator_link;

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverRequest {
    pub search_terms: Vec<String>,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    #[serde(default)]
    pub max_videos_per_term: Option<u32>,
    #[serde(default)]
    pub top_creators_to_rank: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverResponse {
    pub message: String,
    pub new_creators_added: usize,
    pub top_ranked_sec_uids: Vec<String>,
}

/// Finds the creators behind the fastest-moving videos for the search terms
/// and appends the ones the sheet does not list yet.
pub async fn discover_creators(
    ctx: &WorkflowContext<'_>,
    search: &dyn VideoSearch,
    sheets: &dyn SpreadsheetStore,
    request: DiscoverRequest,
) -> Result<DiscoverResponse, WorkflowError> {
    let search_terms: Vec<String> = request
        .search_terms
        .iter()
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
        .collect();
    if search_terms.is_empty() {
        return Err(WorkflowError::InvalidRequest(
            "search_terms must contain at least one term".to_string(),
        ));
    }
    require("spreadsheet_id", &request.spreadsheet_id)?;
    require("sheet_name", &request.sheet_name)?;

    let max_videos = request
        .max_videos_per_term
        .unwrap_or(ctx.config.discovery.max_videos_per_term);
    let top_k = request
        .top_creators_to_rank
        .unwrap_or(ctx.config.discovery.top_creators_to_rank);

    ctx.emit("fetching", "Searching videos");
    let videos = search
        .search_videos(&search_terms, max_videos)
        .await
        .map_err(|err| WorkflowError::upstream("failed to fetch videos from the search service", err))?;

    ctx.emit("scoring", &format!("Scoring {} videos", videos.len()));
    info!(count = videos.len(), "calculating virality velocity");
    let scored = score_videos(ctx.scorer, videos, ctx.now);
    let ranked = rank_creators(&scored, RankingMetric::Velocity, top_k);

    ctx.emit("writing", "Updating creator sheet");
    let existing = existing_creators(sheets, &request.spreadsheet_id, &request.sheet_name).await?;
    info!(count = existing.len(), "existing creators in sheet");

    let new_creators = filter_new_creators(&ranked, &existing);
    for creator in &ranked {
        if existing.contains(&creator.sec_uid) {
            info!(sec_uid = %creator.sec_uid, "creator already listed, skipping");
        }
    }

    let rows: Vec<Vec<Value>> = new_creators
        .iter()
        .map(|creator| {
            vec![
                Value::String(creator.display_name.clone().unwrap_or_default()),
                Value::String(creator.sec_uid.clone()),
                Value::String(creator_link(&creator.sec_uid)),
                Value::String(String::new()),
            ]
        })
        .collect();

    if rows.is_empty() {
        info!("no new creators to append");
    } else {
        sheets
            .append_rows(&request.spreadsheet_id, &request.sheet_name, rows)
            .await
            .map_err(|err| WorkflowError::storage("failed to append creators", err))?;
        info!(count = new_creators.len(), sheet = %request.sheet_name, "appended new creators");
    }

    ctx.emit("done", "Discovery complete");
    Ok(DiscoverResponse {
        message: format!("Process complete. Identified {} top creators.", ranked.len()),
        new_creators_added: new_creators.len(),
        top_ranked_sec_uids: ranked.into_iter().map(|creator| creator.sec_uid).collect(),
    })
}

/// Creator ids already in the sheet; creates the sheet with headers when missing.
async fn existing_creators(
    sheets: &dyn SpreadsheetStore,
    spreadsheet_id: &str,
    sheet_name: &str,
) -> Result<HashSet<String>, WorkflowError> {
    match sheets.get_values(spreadsheet_id, sheet_name).await {
        Ok(values) => {
            let table = SheetTable::from_values(values);
            Ok(table.column_values(COL_CREATOR_SEC_UID).into_iter().collect())
        }
        Err(CollaboratorError::SheetNotFound(_)) => {
            warn!(sheet = sheet_name, "sheet not found, creating it");
            sheets
                .add_sheet(spreadsheet_id, sheet_name, 1, CREATOR_HEADERS.len())
                .await
                .map_err(|err| WorkflowError::storage("failed to create creator sheet", err))?;
            let header = CREATOR_HEADERS
                .iter()
                .map(|name| Value::String(name.to_string()))
                .collect();
            sheets
                .append_rows(spreadsheet_id, sheet_name, vec![header])
                .await
                .map_err(|err| WorkflowError::storage("failed to write sheet headers", err))?;
            Ok(HashSet::new())
        }
        Err(err) => Err(WorkflowError::storage("failed to read creator sheet", err)),
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}
