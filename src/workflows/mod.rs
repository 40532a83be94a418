//! The four request pipelines: discover, refresh followers, report, archive.

pub mod archive;
pub mod discover;
pub mod followers;
pub mod report;

use chrono::{DateTime, Utc};

use crate::config::ServiceConfig;
use crate::progress::ProgressSink;
use crate::scoring::ViralityScorer;

pub use archive::{archive_videos, ArchiveRequest, ArchiveResponse, ArchiveResult, ArchiveStatus};
pub use discover::{discover_creators, DiscoverRequest, DiscoverResponse};
pub use followers::{update_follower_counts, FollowerUpdateRequest, FollowerUpdateResponse};
pub use report::{generate_report, ReportRequest, ReportResponse, ReportRow, REPORT_HEADERS};

/// Everything a workflow needs besides its collaborators.
pub struct WorkflowContext<'a> {
    pub config: &'a ServiceConfig,
    pub scorer: &'a ViralityScorer,
    pub now: DateTime<Utc>,
    pub progress: &'a dyn ProgressSink,
}

impl<'a> WorkflowContext<'a> {
    pub fn emit(&self, event: &str, message: &str) {
        self.progress.emit(event, message);
    }

    /// `prefix` plus the context clock, e.g. `VideoReport_20240101_120000`.
    pub fn timestamped(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.now.format("%Y%m%d_%H%M%S"))
    }
}
