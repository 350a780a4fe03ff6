//! Rubric scoring of sampled tasks on a bounded worker pool.
//!
//! Every selected task is graded independently. Workers append their
//! results to one shared output file; the read-modify-write of that file
//! is serialized by the collection's lock.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::core::{RunSummary, ScoreResult, ScoredTask, SceneLayout, SkipReason, SqaTask, UnitOutcome};
use crate::datastore::TaskTable;
use crate::orchestration::prompts::{scoring_prompt, scoring_schema};
use crate::orchestration::{ModelClient, ModelRequest, WorkerEvent, WorkerPool};
use crate::state::SharedCollection;
use crate::Result;

use super::sample::select_tasks_by_scene;

/// Parse and validate the model's rubric verdict.
pub fn parse_score_response(text: &str) -> Result<ScoreResult> {
    let result: ScoreResult = serde_json::from_str(text)?;
    result.validate()?;
    Ok(result)
}

/// Settings for one scoring pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringOptions {
    /// Tasks drawn per source per scene.
    pub sample_size: usize,
    /// Concurrent workers.
    pub workers: usize,
    /// Seed for reproducible sampling.
    pub seed: Option<u64>,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            sample_size: 3,
            workers: 4,
            seed: None,
        }
    }
}

/// Grades one task at a time; cheap to clone into workers.
#[derive(Clone)]
pub struct TaskScorer {
    model: Arc<dyn ModelClient>,
    model_name: String,
    layout: SceneLayout,
    output: Arc<SharedCollection<ScoredTask>>,
}

impl TaskScorer {
    pub fn new(
        model: Arc<dyn ModelClient>,
        model_name: &str,
        layout: SceneLayout,
        output: Arc<SharedCollection<ScoredTask>>,
    ) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            layout,
            output,
        }
    }

    /// Score one task and append the result.
    pub async fn score(&self, task: SqaTask) -> UnitOutcome {
        if !task.is_complete() {
            warn!(
                "Skipping incomplete task {} (scene '{}')",
                display_id(&task),
                task.sceneid
            );
            return UnitOutcome::skipped(SkipReason::IncompleteRecord);
        }

        let inputs = self.layout.inputs(&task.sceneid);
        if let Err(e) = inputs.ensure_present() {
            warn!("{}. Skipping task {}.", e, display_id(&task));
            return UnitOutcome::skipped(SkipReason::MissingInputs);
        }

        let request = ModelRequest {
            model: self.model_name.clone(),
            video: inputs.video,
            image: inputs.image,
            prompt: scoring_prompt(&task),
            response_schema: scoring_schema(),
        };

        let result = match self.model.generate(&request).await {
            Ok(text) => parse_score_response(&text),
            Err(e) => Err(e),
        };
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!("Error during generation for scene {}: {}", task.sceneid, e);
                return UnitOutcome::failed(e);
            }
        };

        let scored = ScoredTask::new(&task, result);
        match self.output.append(vec![scored]).await {
            Ok(_) => UnitOutcome::succeeded(1),
            Err(e) => {
                error!("Error writing result for scene {}: {}", task.sceneid, e);
                UnitOutcome::failed(e)
            }
        }
    }
}

fn display_id(task: &SqaTask) -> String {
    task.id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<no id>".to_string())
}

/// Drives a full scoring pass: fetch, sample, grade.
pub struct Scorer {
    table: Arc<dyn TaskTable>,
    scorer: TaskScorer,
    options: ScoringOptions,
}

impl Scorer {
    pub fn new(table: Arc<dyn TaskTable>, scorer: TaskScorer, options: ScoringOptions) -> Self {
        Self {
            table,
            scorer,
            options,
        }
    }

    /// Fetch tasks and score a sample of them.
    ///
    /// Only the initial fetch can fail the run; per-task errors are
    /// recorded in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let all = self.table.fetch_tasks().await?;
        let fetched = all.len();
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let selected = select_tasks_by_scene(all, self.options.sample_size, &mut rng);
        info!(
            "Fetched {} tasks, selected {} for scoring ({} per source per scene)",
            fetched,
            selected.len(),
            self.options.sample_size
        );
        Ok(self.score_all(selected).await)
    }

    /// Score `tasks` on the worker pool, logging progress as they finish.
    pub async fn score_all(&self, tasks: Vec<SqaTask>) -> RunSummary {
        let total = tasks.len();
        let (tx, rx) = mpsc::unbounded_channel();
        let progress = tokio::spawn(report_progress(rx, total));

        let pool = WorkerPool::new(self.options.workers).with_events(tx);
        let scorer = self.scorer.clone();
        let outcomes = pool
            .run(tasks, move |task| {
                let scorer = scorer.clone();
                async move { scorer.score(task).await }
            })
            .await;
        drop(pool);
        let _ = progress.await;

        let mut summary = RunSummary::default();
        for outcome in &outcomes {
            summary.record(outcome);
        }
        info!("Scoring finished: {}", summary);
        summary
    }
}

async fn report_progress(mut rx: mpsc::UnboundedReceiver<WorkerEvent>, total: usize) {
    let mut done = 0;
    while let Some(event) = rx.recv().await {
        if let WorkerEvent::Finished { outcome, .. } = event {
            done += 1;
            info!("Processing tasks [{}/{}] {}", done, total, outcome);
        }
    }
}
