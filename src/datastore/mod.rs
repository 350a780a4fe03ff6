//! The boundary to the hosted task table.
//!
//! The scorer reads every task; the uploader writes scores back by id.

mod supabase;

use async_trait::async_trait;

use crate::core::{SqaTask, TaskRowId};
use crate::Result;

pub use supabase::SupabaseTable;

/// Columns projected when fetching tasks for scoring.
pub const TASK_COLUMNS: [&str; 6] = ["sceneid", "situation", "question", "answer", "source", "id"];

/// A hosted table of SQA tasks.
#[async_trait]
pub trait TaskTable: Send + Sync {
    /// Fetch every row, projected to [`TASK_COLUMNS`].
    async fn fetch_tasks(&self) -> Result<Vec<SqaTask>>;

    /// Record a rubric score for one row and mark it as tested.
    async fn apply_score(&self, id: &TaskRowId, score: f64) -> Result<()>;
}
