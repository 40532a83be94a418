use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::collaborators::{CellUpdate, CreatorDirectory, SpreadsheetStore};
use crate::error::WorkflowError;
use crate::sheet_table::{SheetTable, COL_CREATOR_SEC_UID, COL_FOLLOWER_COUNT};
use crate::workflows::discover::require;
use crate::workflows::WorkflowContext;

#[derive(Debug, Clone, Deserialize)]
pub struct FollowerUpdateRequest {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowerUpdateResponse {
    pub message: String,
    pub users_checked: usize,
    pub users_updated: usize,
    pub users_failed: usize,
}

struct PendingCreator {
    row: usize,
    sec_uid: String,
}

/// Fills in the follower count of every listed creator that has none yet.
pub async fn update_follower_counts(
    ctx: &WorkflowContext<'_>,
    directory: &dyn CreatorDirectory,
    sheets: &dyn SpreadsheetStore,
    request: FollowerUpdateRequest,
) -> Result<FollowerUpdateResponse, WorkflowError> {
    require("spreadsheet_id", &request.spreadsheet_id)?;
    require("sheet_name", &request.sheet_name)?;

    let values = sheets
        .get_values(&request.spreadsheet_id, &request.sheet_name)
        .await
        .map_err(|err| WorkflowError::storage("failed to read creator sheet", err))?;
    let table = SheetTable::from_values(values);

    if table.data_row_count() == 0 {
        return Ok(FollowerUpdateResponse {
            message: "Sheet is empty or contains only headers.".to_string(),
            users_checked: 0,
            users_updated: 0,
            users_failed: 0,
        });
    }

    let (Some(sec_uid_col), Some(follower_col)) = (
        table.column_index(COL_CREATOR_SEC_UID),
        table.column_index(COL_FOLLOWER_COUNT),
    ) else {
        return Err(WorkflowError::InvalidRequest(format!(
            "Missing required column in sheet. Please ensure '{}' and '{}' columns exist.",
            COL_CREATOR_SEC_UID, COL_FOLLOWER_COUNT
        )));
    };

    let users_checked = table.data_row_count();
    let pending: Vec<PendingCreator> = table
        .numbered_rows()
        .enumerate()
        .filter(|(index, _)| table.cell(*index, follower_col).trim().is_empty())
        .filter_map(|(index, (row, _))| {
            let sec_uid = table.cell(index, sec_uid_col).trim();
            (!sec_uid.is_empty()).then(|| PendingCreator {
                row,
                sec_uid: sec_uid.to_string(),
            })
        })
        .collect();

    if pending.is_empty() {
        return Ok(FollowerUpdateResponse {
            message: "No users needed a follower count update.".to_string(),
            users_checked,
            users_updated: 0,
            users_failed: 0,
        });
    }

    info!(count = pending.len(), "creators need a follower count");
    ctx.emit("fetching", &format!("Fetching follower counts for {} creators", pending.len()));

    let mut users_failed = 0usize;
    let mut updates = Vec::new();
    for creator in &pending {
        match directory.follower_count(&creator.sec_uid).await {
            Ok(Some(count)) => {
                info!(sec_uid = %creator.sec_uid, followers = count, "fetched follower count");
                updates.push(CellUpdate {
                    row: creator.row,
                    col: follower_col + 1,
                    value: Value::from(count),
                });
            }
            Ok(None) => {
                users_failed += 1;
                warn!(sec_uid = %creator.sec_uid, "no follower count in response");
            }
            Err(err) => {
                users_failed += 1;
                error!(sec_uid = %creator.sec_uid, error = %err, "failed to fetch follower count");
            }
        }
    }

    let mut users_updated = updates.len();
    if !updates.is_empty() {
        ctx.emit("writing", "Writing follower counts");
        if let Err(err) = sheets
            .update_cells(&request.spreadsheet_id, &request.sheet_name, updates)
            .await
        {
            error!(error = %err, "batch update of follower counts failed");
            users_failed += users_updated;
            users_updated = 0;
        } else {
            info!(count = users_updated, "updated follower counts");
        }
    }

    ctx.emit("done", "Follower update complete");
    Ok(FollowerUpdateResponse {
        message: "Follower count update process complete.".to_string(),
        users_checked,
        users_updated,
        users_failed,
    })
}
