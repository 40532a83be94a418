use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::collaborators::{BlobStore, CreatorDirectory};
use crate::error::{CollaboratorError, WorkflowError};
use crate::workflows::discover::require;
use crate::workflows::WorkflowContext;

const VIDEO_MIME_TYPE: &str = "video/mp4";

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveRequest {
    pub parent_folder_id: String,
    pub video_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveResult {
    pub video_id: String,
    pub status: ArchiveStatus,
    pub drive_link: Option<String>,
    pub error_detail: Option<String>,
}

impl ArchiveResult {
    fn success(video_id: &str, drive_link: String) -> Self {
        Self {
            video_id: video_id.to_string(),
            status: ArchiveStatus::Success,
            drive_link: Some(drive_link),
            error_detail: None,
        }
    }

    fn failed(video_id: &str, err: &CollaboratorError) -> Self {
        Self {
            video_id: video_id.to_string(),
            status: ArchiveStatus::Failed,
            drive_link: None,
            error_detail: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveResponse {
    pub message: String,
    pub new_folder_url: String,
    pub download_results: Vec<ArchiveResult>,
}

pub fn archive_filename(video_id: &str) -> String {
    format!("douyin_{}.mp4", video_id)
}

/// Copies each video into a fresh timestamped Drive folder. A failing video
/// is reported in its result entry and does not stop the others.
pub async fn archive_videos(
    ctx: &WorkflowContext<'_>,
    directory: &dyn CreatorDirectory,
    blobs: &dyn BlobStore,
    request: ArchiveRequest,
) -> Result<ArchiveResponse, WorkflowError> {
    let video_ids: Vec<&str> = request
        .video_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    if video_ids.is_empty() {
        return Err(WorkflowError::InvalidRequest(
            "The 'video_ids' list cannot be empty.".to_string(),
        ));
    }
    require("parent_folder_id", &request.parent_folder_id)?;

    let folder_name = ctx.timestamped("Downloaded_Videos");
    let folder = blobs
        .create_folder(&folder_name, &request.parent_folder_id)
        .await
        .map_err(|err| WorkflowError::storage("failed to create the Drive folder", err))?;
    info!(folder = %folder_name, id = %folder.id, "created archive folder");

    let total = video_ids.len();
    let mut download_results = Vec::with_capacity(total);
    for (index, video_id) in video_ids.into_iter().enumerate() {
        ctx.emit(
            "fetching",
            &format!("Archiving video {} of {} ({})", index + 1, total, video_id),
        );
        let result = match archive_one(directory, blobs, &folder.id, video_id).await {
            Ok(link) => {
                info!(video_id, link = %link, "archived video");
                ArchiveResult::success(video_id, link)
            }
            Err(err) => {
                error!(video_id, error = %err, "failed to archive video");
                ArchiveResult::failed(video_id, &err)
            }
        };
        download_results.push(result);
    }

    ctx.emit("done", "Archive complete");
    Ok(ArchiveResponse {
        message: "Video download process complete.".to_string(),
        new_folder_url: folder.link,
        download_results,
    })
}

async fn archive_one(
    directory: &dyn CreatorDirectory,
    blobs: &dyn BlobStore,
    folder_id: &str,
    video_id: &str,
) -> Result<String, CollaboratorError> {
    let url = directory.download_url(video_id).await?;
    let data = directory.download(&url).await?;
    blobs
        .upload(folder_id, &archive_filename(video_id), VIDEO_MIME_TYPE, data)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let value = serde_json::to_value(ArchiveStatus::Failed).unwrap();
        assert_eq!(value, serde_json::json!("failed"));
        assert_eq!(archive_filename("7312"), "douyin_7312.mp4");
    }
}
