//! Interfaces of the external services the workflows talk to.
//!
//! The HTTP clients in this crate implement these traits; tests swap in
//! in-memory versions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollaboratorError;
use crate::VideoMetric;

/// Keyword search over the short-video platform.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search_videos(
        &self,
        search_terms: &[String],
        max_videos_per_term: u32,
    ) -> Result<Vec<VideoMetric>, CollaboratorError>;
}

/// Per-creator and per-video lookups.
#[async_trait]
pub trait CreatorDirectory: Send + Sync {
    /// `Ok(None)` when the service answered but had no follower count.
    async fn follower_count(&self, sec_uid: &str) -> Result<Option<u64>, CollaboratorError>;

    async fn recent_videos(
        &self,
        sec_uid: &str,
        count: u32,
    ) -> Result<Vec<VideoMetric>, CollaboratorError>;

    /// Direct, watermark-free download URL of a video.
    async fn download_url(&self, aweme_id: &str) -> Result<String, CollaboratorError>;

    async fn download(&self, url: &str) -> Result<Vec<u8>, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRef {
    pub sheet_id: i64,
    pub title: String,
}

/// One cell of a batch update, 1-based like the spreadsheet UI.
#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: Value,
}

#[async_trait]
pub trait SpreadsheetStore: Send + Sync {
    /// All values of a worksheet, row by row. Missing spreadsheet or sheet is `NotFound`.
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Vec<Vec<String>>, CollaboratorError>;

    async fn add_sheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: usize,
        cols: usize,
    ) -> Result<SheetRef, CollaboratorError>;

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), CollaboratorError>;

    async fn update_cells(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        cells: Vec<CellUpdate>,
    ) -> Result<(), CollaboratorError>;

    /// Overwrites a block starting at `start_cell` (A1 notation).
    async fn write_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start_cell: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFolder {
    pub id: String,
    pub link: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_folder(
        &self,
        name: &str,
        parent_folder_id: &str,
    ) -> Result<DriveFolder, CollaboratorError>;

    /// Uploads `data` into `folder_id` and returns the view link.
    async fn upload(
        &self,
        folder_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<String, CollaboratorError>;
}
