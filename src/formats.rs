use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A chapter discovered during series pagination.
///
/// Sequence numbers are assigned in discovery order (page order, then DOM
/// order within a page) as a contiguous 1-based range, and are the canonical
/// chapter numbering used in output file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterReference {
    pub source_url: String,
    pub sequence_number: u32,
}

/// Series identity resolved once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub display_name: String,
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    SessionFailed,
    ExtractionFailed,
    WriteFailed,
}

/// Terminal result of one chapter within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub chapter: ChapterReference,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl DownloadOutcome {
    pub fn succeeded(chapter: ChapterReference) -> Self {
        Self {
            chapter,
            status: OutcomeStatus::Succeeded,
            error_detail: None,
        }
    }

    pub fn failed(chapter: ChapterReference, status: OutcomeStatus, detail: String) -> Self {
        Self {
            chapter,
            status,
            error_detail: Some(detail),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AllSucceeded,
    PartialFailure,
    /// Non-empty chapter list with zero successes. Usually a systemic cause
    /// such as expired credentials, not per-chapter flakiness.
    AllFailed,
}

/// Aggregate result of a full series run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub series: SeriesInfo,
    /// Number of chapters discovered. May exceed `outcomes.len()` when the
    /// run was cancelled before every chapter was attempted.
    pub total: usize,
    pub outcomes: Vec<DownloadOutcome>,
    pub cancelled: bool,
    pub generated_at: String,
}

impl RunReport {
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> Vec<&DownloadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    pub fn status(&self) -> RunStatus {
        let succeeded = self.succeeded_count();
        if succeeded == self.total && self.outcomes.len() == self.total {
            RunStatus::AllSucceeded
        } else if succeeded == 0 && self.total > 0 {
            RunStatus::AllFailed
        } else {
            RunStatus::PartialFailure
        }
    }
}
