//! Push scores from a scoring output file back to the task table.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::core::{RunSummary, SkipReason, TaskRowId, UnitOutcome};
use crate::datastore::TaskTable;
use crate::state::OutputCollection;
use crate::util::truncate;
use crate::Result;

/// The two fields the uploader needs from a scored record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub id: TaskRowId,
    pub score: f64,
}

impl ScoreUpdate {
    /// Extract id and score from a record, if both are present.
    ///
    /// Records are read loosely so that entries written by other tools, or
    /// with extra fields, still upload.
    pub fn from_record(record: &Value) -> Option<Self> {
        let id = match record.get("id")? {
            Value::Number(n) => TaskRowId::Int(n.as_i64()?),
            Value::String(s) if !s.is_empty() => TaskRowId::Text(s.clone()),
            _ => return None,
        };
        let score = record.get("score")?.as_f64()?;
        Some(Self { id, score })
    }
}

/// Applies recorded scores to the hosted table, one row at a time.
pub struct Uploader {
    table: Arc<dyn TaskTable>,
}

impl Uploader {
    pub fn new(table: Arc<dyn TaskTable>) -> Self {
        Self { table }
    }

    /// Upload every record of the file at `input`.
    ///
    /// A missing or unreadable file fails the run; a failed row does not.
    pub async fn run(&self, input: &Path) -> Result<RunSummary> {
        let records = OutputCollection::<Value>::new(input).load_existing().await?;
        info!("Uploading scores from {} ({} records)", input.display(), records.len());
        Ok(self.upload_records(&records).await)
    }

    pub async fn upload_records(&self, records: &[Value]) -> RunSummary {
        let mut summary = RunSummary::default();
        for record in records {
            let outcome = self.upload_one(record).await;
            summary.record(&outcome);
        }
        info!("Upload finished: {}", summary);
        summary
    }

    async fn upload_one(&self, record: &Value) -> UnitOutcome {
        let Some(update) = ScoreUpdate::from_record(record) else {
            warn!(
                "Skipping item with missing id or score: {}",
                truncate(&record.to_string(), 200)
            );
            return UnitOutcome::skipped(SkipReason::MissingIdOrScore);
        };

        match self.table.apply_score(&update.id, update.score).await {
            Ok(()) => {
                info!("Updated id {} with score {}", update.id, update.score);
                UnitOutcome::succeeded(1)
            }
            Err(e) => {
                error!("Failed to update id {}: {}", update.id, e);
                UnitOutcome::failed(e)
            }
        }
    }
}
