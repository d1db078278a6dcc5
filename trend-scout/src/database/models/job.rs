//! Job database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::{AnalysisKind, TargetLanguage};
use crate::utils::json::{self, JsonContext};
use crate::{Error, Result};

/// Job database model.
/// Represents one unit of queued pipeline work for a candidate.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDbModel {
    pub id: i64,
    /// External id of the candidate this job works on
    pub candidate_id: String,
    /// Job type: fetch, analyze, translate
    pub job_type: String,
    /// Status: pending, processing, completed, failed
    pub status: String,
    /// Higher runs sooner
    pub priority: i64,
    pub attempts: i64,
    pub max_attempts: i64,
    /// JSON blob with job-specific parameters
    pub payload: String,
    pub error_message: Option<String>,
    /// Unix epoch milliseconds
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

impl JobDbModel {
    pub fn kind(&self) -> Result<JobType> {
        JobType::from_str(&self.job_type).map_err(|_| {
            Error::Database(format!(
                "job {} has unknown job_type '{}'",
                self.id, self.job_type
            ))
        })
    }

    pub fn state(&self) -> Result<JobStatus> {
        JobStatus::from_str(&self.status).map_err(|_| {
            Error::Database(format!("job {} has unknown status '{}'", self.id, self.status))
        })
    }

    pub fn parsed_payload(&self) -> JobPayload {
        json::parse_or_default(
            &self.payload,
            JsonContext::JobField {
                job_id: self.id,
                field: "payload",
            },
            "Invalid job payload JSON; using defaults",
        )
    }
}

/// Job types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Re-host the candidate's media.
    Fetch,
    /// Run multimodal analysis on re-hosted media.
    Analyze,
    /// Translate a stored analysis.
    Translate,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Job status values.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is queued and waiting to be claimed.
    Pending,
    /// Job is claimed by a coordinator.
    Processing,
    /// Job finished successfully.
    Completed,
    /// Job failed terminally; never retried automatically.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Job-specific parameters stored in `payload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<TargetLanguage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_kind: Option<AnalysisKind>,
}

impl JobPayload {
    pub fn translate(target_lang: TargetLanguage, analysis_kind: AnalysisKind) -> Self {
        Self {
            target_lang: Some(target_lang),
            analysis_kind: Some(analysis_kind),
        }
    }
}

/// A job to be inserted.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub candidate_id: String,
    pub job_type: JobType,
    pub priority: i64,
    pub max_attempts: i64,
    pub payload: JobPayload,
}

impl NewJob {
    pub fn new(candidate_id: impl Into<String>, job_type: JobType, max_attempts: i64) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            job_type,
            priority: 0,
            max_attempts: max_attempts.max(1),
            payload: JobPayload::default(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: JobPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Job counts grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}
