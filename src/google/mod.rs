pub mod auth;
pub mod drive;
pub mod sheets;

pub use auth::ServiceAccountAuth;
pub use drive::DriveClient;
pub use sheets::SheetsClient;

pub fn spreadsheet_url(spreadsheet_id: &str, sheet_id: i64) -> String {
    format!(
        "https://docs.google.com/spreadsheets/d/{}/edit#gid={}",
        spreadsheet_id, sheet_id
    )
}
