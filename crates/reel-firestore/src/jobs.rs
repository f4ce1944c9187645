//! Job record repository.
//!
//! Document layout under the jobs collection:
//!
//! ```text
//! status      string
//! video       string, final URL
//! batches     map { count: integer, outputs: array<map { batch, output }> }
//! joiner      integer, batch that claimed the join
//! error       string
//! created_at  timestamp
//! updated_at  timestamp
//! ```
//!
//! Batch outputs are appended with a server-side `appendMissingElements`
//! transform so concurrent completions never overwrite each other, and a
//! repeated delivery of the same entry is a no-op. The processing -> joining
//! swap goes through [`JobRepository::claim_join`], which also records the
//! batch that owns the join.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use reel_models::{BatchOutput, BatchSummary, JobId, JobRecord, JobStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_transition_conflict;
use crate::types::{
    ArrayValue, Document, DocumentMask, FieldTransform, FromFirestoreValue, Precondition,
    ToFirestoreValue, Value, Write,
};

/// Read-compare-write attempts before a transition gives up.
const MAX_TRANSITION_ATTEMPTS: u32 = 8;

/// A job record together with the server version it was read at.
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub record: JobRecord,
    pub update_time: Option<String>,
}

fn output_value(output: &BatchOutput) -> Value {
    Value::map([
        ("batch", output.batch.to_firestore_value()),
        ("output", output.output.to_firestore_value()),
    ])
}

fn output_from_value(value: &Value) -> Option<BatchOutput> {
    let batch = value.field("batch").and_then(u32::from_firestore_value)?;
    let output = value.field("output").and_then(String::from_firestore_value)?;
    Some(BatchOutput::new(batch, output))
}

fn record_to_fields(record: &JobRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("status".to_string(), record.status.as_str().to_firestore_value());
    fields.insert("created_at".to_string(), record.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), record.updated_at.to_firestore_value());

    if let Some(video) = &record.video {
        fields.insert("video".to_string(), video.to_firestore_value());
    }
    if let Some(error) = &record.error {
        fields.insert("error".to_string(), error.to_firestore_value());
    }
    if let Some(joiner) = record.joiner {
        fields.insert("joiner".to_string(), joiner.to_firestore_value());
    }
    if let Some(batches) = &record.batches {
        fields.insert(
            "batches".to_string(),
            Value::map([
                ("count", batches.count.to_firestore_value()),
                (
                    "outputs",
                    Value::ArrayValue(ArrayValue {
                        values: Some(batches.outputs.iter().map(output_value).collect()),
                    }),
                ),
            ]),
        );
    }
    fields
}

fn record_from_document(id: &JobId, doc: &Document) -> FirestoreResult<JobRecord> {
    let status = doc
        .get::<String>("status")
        .and_then(|s| JobStatus::parse(&s))
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!("job {} has no valid status", id))
        })?;

    let batches = doc.field("batches").map(|b| BatchSummary {
        count: b.field("count").and_then(u32::from_firestore_value).unwrap_or(0),
        outputs: b
            .field("outputs")
            .map(|o| o.elements().iter().filter_map(output_from_value).collect())
            .unwrap_or_default(),
    });

    let now = Utc::now();
    Ok(JobRecord {
        id: id.clone(),
        status,
        video: doc.get("video"),
        batches,
        joiner: doc.field("joiner").and_then(u32::from_firestore_value),
        error: doc.get("error"),
        created_at: doc.get::<DateTime<Utc>>("created_at").unwrap_or(now),
        updated_at: doc.get::<DateTime<Utc>>("updated_at").unwrap_or(now),
    })
}

/// Repository for job records.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
    collection: String,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        let collection = client.config().jobs_collection.clone();
        Self { client, collection }
    }

    /// Create a new job record. Fails with `AlreadyExists` if the ID is taken.
    pub async fn create(&self, record: &JobRecord) -> FirestoreResult<()> {
        let fields = record_to_fields(record);
        self.client
            .with_retry("create_job", || {
                self.client
                    .create_document(&self.collection, record.id.as_str(), fields.clone())
            })
            .await?;

        info!(job_id = %record.id, "Created job record");
        Ok(())
    }

    /// Read a job record and its version.
    pub async fn get(&self, id: &JobId) -> FirestoreResult<Option<StoredJob>> {
        let doc = self
            .client
            .with_retry("get_job", || {
                self.client.get_document(&self.collection, id.as_str())
            })
            .await?;

        match doc {
            Some(doc) => Ok(Some(StoredJob {
                record: record_from_document(id, &doc)?,
                update_time: doc.update_time,
            })),
            None => Ok(None),
        }
    }

    async fn patch(
        &self,
        operation: &str,
        id: &JobId,
        mut fields: HashMap<String, Value>,
        mask: &[&str],
        precondition: Option<&Precondition>,
    ) -> FirestoreResult<Document> {
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        let mut paths = mask.to_vec();
        paths.push("updated_at");

        self.client
            .with_retry(operation, || {
                self.client.patch_document(
                    &self.collection,
                    id.as_str(),
                    fields.clone(),
                    &paths,
                    precondition,
                )
            })
            .await
    }

    /// Record how many batches the job was split into.
    pub async fn set_batch_count(&self, id: &JobId, count: u32) -> FirestoreResult<()> {
        let fields = HashMap::from([(
            "batches".to_string(),
            Value::map([("count", count.to_firestore_value())]),
        )]);
        self.patch(
            "set_batch_count",
            id,
            fields,
            &["batches.count"],
            Some(&Precondition::exists()),
        )
        .await?;
        debug!(job_id = %id, count, "Set batch count");
        Ok(())
    }

    /// Unconditionally set status, clearing or setting the final video URL.
    pub async fn set_status(
        &self,
        id: &JobId,
        status: JobStatus,
        video: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::from([(
            "status".to_string(),
            status.as_str().to_firestore_value(),
        )]);
        if let Some(url) = video {
            fields.insert("video".to_string(), url.to_firestore_value());
        }

        self.patch("set_status", id, fields, &["status", "video"], None)
            .await?;
        info!(job_id = %id, status = %status, "Job status updated");
        Ok(())
    }

    /// Mark the job failed with a reason.
    pub async fn mark_failed(&self, id: &JobId, error: &str) -> FirestoreResult<()> {
        let fields = HashMap::from([
            (
                "status".to_string(),
                JobStatus::Failed.as_str().to_firestore_value(),
            ),
            ("error".to_string(), error.to_firestore_value()),
        ]);

        self.patch("mark_failed", id, fields, &["status", "error"], None)
            .await?;
        warn!(job_id = %id, error = %error, "Job marked failed");
        Ok(())
    }

    /// Append one batch output to `batches.outputs`.
    ///
    /// Creates the list if it is missing. Appending an identical entry again
    /// leaves the list unchanged.
    pub async fn append_output(&self, id: &JobId, output: &BatchOutput) -> FirestoreResult<()> {
        let name = self.client.document_name(&self.collection, id.as_str());

        let write = || Write {
            update: Some(Document::named(
                name.clone(),
                HashMap::from([("updated_at".to_string(), Utc::now().to_firestore_value())]),
            )),
            update_mask: Some(DocumentMask::new(["updated_at"])),
            update_transforms: vec![FieldTransform::append_missing(
                "batches.outputs",
                vec![output_value(output)],
            )],
            current_document: Some(Precondition::exists()),
        };

        self.client
            .with_retry("append_output", || self.client.commit(vec![write()]))
            .await?;

        debug!(job_id = %id, batch = output.batch, "Appended batch output");
        Ok(())
    }

    /// Move the job from processing to joining with `batch` as the owner.
    ///
    /// Returns `true` when `batch` owns the join afterwards. That includes a
    /// record already claimed by `batch`: a redelivered message, or a write
    /// that landed although its response was lost and the retry then failed
    /// the precondition. Concurrent writers that bump the version between
    /// read and write cause a re-read.
    pub async fn claim_join(&self, id: &JobId, batch: u32) -> FirestoreResult<bool> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let stored = self
                .get(id)
                .await?
                .ok_or_else(|| FirestoreError::not_found(format!("job {}", id)))?;

            if stored.record.join_owned_by(batch) {
                debug!(job_id = %id, batch, "Join already owned by this batch");
                return Ok(true);
            }
            if stored.record.status != JobStatus::Processing {
                debug!(job_id = %id, current = %stored.record.status, "Join claim skipped");
                return Ok(false);
            }

            let precondition = match stored.update_time {
                Some(ts) => Precondition::updated_at(ts),
                None => {
                    return Err(FirestoreError::invalid_response(
                        "document read without updateTime",
                    ))
                }
            };

            let fields = HashMap::from([
                (
                    "status".to_string(),
                    JobStatus::Joining.as_str().to_firestore_value(),
                ),
                ("joiner".to_string(), batch.to_firestore_value()),
            ]);

            match self
                .patch("claim_join", id, fields, &["status", "joiner"], Some(&precondition))
                .await
            {
                Ok(_) => {
                    info!(job_id = %id, batch, "Join claimed");
                    return Ok(true);
                }
                Err(e) if e.is_precondition_failed() => {
                    record_transition_conflict();
                    debug!(job_id = %id, attempt, "Join claim raced a concurrent write, re-reading");
                }
                Err(e) => return Err(e),
            }
        }

        Err(FirestoreError::PreconditionFailed(format!(
            "job {} kept changing while batch {} claimed the join",
            id, batch
        )))
    }
}
