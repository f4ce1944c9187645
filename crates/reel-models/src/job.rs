//! Job identity and the persisted job record.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status stored on the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Request accepted, slides or batches are rendering
    #[default]
    Processing,
    /// All batches delivered and one worker owns the join
    Joining,
    /// Finished, with or without a video
    Processed,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Joining => "joining",
            JobStatus::Processed => "processed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(JobStatus::Processing),
            "joining" => Some(JobStatus::Joining),
            "processed" => Some(JobStatus::Processed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Processed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One rendered batch reported back to the job record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BatchOutput {
    /// 1-based batch sequence number
    pub batch: u32,
    /// URL of the uploaded partial render
    pub output: String,
}

impl BatchOutput {
    pub fn new(batch: u32, output: impl Into<String>) -> Self {
        Self {
            batch,
            output: output.into(),
        }
    }
}

/// Batch bookkeeping on the job record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchSummary {
    /// Number of batches the job was split into
    pub count: u32,
    /// Partial outputs in arrival order
    #[serde(default)]
    pub outputs: Vec<BatchOutput>,
}

/// The persisted state of one slideshow job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,

    pub status: JobStatus,

    /// Final video URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batches: Option<BatchSummary>,

    /// Batch whose delivery claimed the join
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joiner: Option<u32>,

    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh record in the processing state.
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Processing,
            video: None,
            batches: None,
            joiner: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of batches the job expects, zero when not batched.
    pub fn expected_batches(&self) -> u32 {
        self.batches.as_ref().map(|b| b.count).unwrap_or(0)
    }

    /// Received outputs keyed by batch number.
    ///
    /// A batch delivered more than once counts once; the first delivery wins.
    pub fn received_batches(&self) -> BTreeMap<u32, &str> {
        let mut received = BTreeMap::new();
        if let Some(batches) = &self.batches {
            for out in &batches.outputs {
                received.entry(out.batch).or_insert(out.output.as_str());
            }
        }
        received
    }

    /// Outputs ordered by batch number ascending, duplicates removed.
    pub fn ordered_outputs(&self) -> Vec<BatchOutput> {
        self.received_batches()
            .into_iter()
            .map(|(batch, output)| BatchOutput::new(batch, output))
            .collect()
    }

    /// Whether every expected batch has reported while the job is still open.
    pub fn ready_to_join(&self) -> bool {
        let expected = self.expected_batches();
        self.status == JobStatus::Processing
            && expected > 0
            && self.received_batches().len() as u32 == expected
    }

    /// Whether `batch` claimed the join and the join has not finished.
    pub fn join_owned_by(&self, batch: u32) -> bool {
        self.status == JobStatus::Joining && self.joiner == Some(batch)
    }
}
