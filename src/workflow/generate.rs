//! Resumable SQA generation over a range of scenes.
//!
//! For each scene index the generator skips scenes already present in the
//! output file and scenes whose inputs are missing, asks the model for three
//! examples, and appends one record per example. A failing scene is logged
//! and the run moves on; nothing is retried.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::core::{RunSummary, SceneId, SceneLayout, SkipReason, SqaTask, UnitOutcome};
use crate::orchestration::prompts::{generation_schema, GENERATION_PROMPT};
use crate::orchestration::{ModelClient, ModelRequest};
use crate::state::OutputCollection;
use crate::{Error, Result};

/// The model's answer: parallel arrays, one entry per example.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub situation_description: Vec<String>,
    pub question: Vec<String>,
    pub answer: Vec<String>,
}

impl GenerationResponse {
    /// Split into one generated task per example.
    pub fn into_tasks(self, scene: &SceneId) -> Result<Vec<SqaTask>> {
        let n = self.situation_description.len();
        if self.question.len() != n || self.answer.len() != n {
            return Err(Error::MalformedResponse(format!(
                "array lengths differ: {} situations, {} questions, {} answers",
                n,
                self.question.len(),
                self.answer.len()
            )));
        }
        Ok(self
            .situation_description
            .iter()
            .zip(&self.question)
            .zip(&self.answer)
            .map(|((situation, question), answer)| {
                SqaTask::generated(scene.clone(), situation, question, answer)
            })
            .collect())
    }
}

/// Parse the model's JSON text into generated tasks for `scene`.
pub fn parse_generation_response(text: &str, scene: &SceneId) -> Result<Vec<SqaTask>> {
    let response: GenerationResponse = serde_json::from_str(text)?;
    response.into_tasks(scene)
}

/// Drives SQA generation for a range of scenes.
pub struct Generator {
    model: Arc<dyn ModelClient>,
    model_name: String,
    layout: SceneLayout,
    output: OutputCollection<SqaTask>,
}

impl Generator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        model_name: &str,
        layout: SceneLayout,
        output: OutputCollection<SqaTask>,
    ) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            layout,
            output,
        }
    }

    /// Scene ids already present in the output file.
    ///
    /// An unreadable file is treated as empty so the run can still proceed.
    pub async fn processed_scene_ids(&self) -> HashSet<SceneId> {
        match self.output.load().await {
            Ok(records) => records.into_iter().map(|r| r.sceneid).collect(),
            Err(e) => {
                error!(
                    "[Error reading output file] {}: {}",
                    self.output.path().display(),
                    e
                );
                HashSet::new()
            }
        }
    }

    /// Process every scene in `scenes` in order.
    pub async fn run(&self, scenes: Range<u32>) -> RunSummary {
        let mut processed = self.processed_scene_ids().await;
        info!(
            "Generating scenes {}..{} into {} ({} scenes already done)",
            scenes.start,
            scenes.end,
            self.output.path().display(),
            processed.len()
        );

        let mut summary = RunSummary::default();
        for index in scenes {
            let outcome = self.process_scene(index, &mut processed).await;
            summary.record(&outcome);
        }
        info!("Generation finished: {}", summary);
        summary
    }

    /// Process one scene and record it in `processed` on success.
    pub async fn process_scene(&self, index: u32, processed: &mut HashSet<SceneId>) -> UnitOutcome {
        let scene = SceneId::from_index(index);
        if processed.contains(&scene) {
            info!("[Skipped] Scene {} already processed.", scene);
            return UnitOutcome::skipped(SkipReason::AlreadyProcessed);
        }

        let inputs = self.layout.inputs(&scene);
        if let Err(e) = inputs.ensure_present() {
            info!("[Skipped] {}", e);
            return UnitOutcome::skipped(SkipReason::MissingInputs);
        }

        info!("[Processing] Scene {:04}", index);
        let request = ModelRequest {
            model: self.model_name.clone(),
            video: inputs.video,
            image: inputs.image,
            prompt: GENERATION_PROMPT.to_string(),
            response_schema: generation_schema(),
        };

        let text = match self.model.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                error!("[Error in generate()] Scene: {}, Error: {}", scene, e);
                return UnitOutcome::failed(e);
            }
        };

        let tasks = match parse_generation_response(&text, &scene) {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("[Error parsing scene] Scene: {}, Error: {}", scene, e);
                return UnitOutcome::failed(e);
            }
        };
        if tasks.is_empty() {
            warn!("Scene {} produced no examples", scene);
        }

        let count = tasks.len();
        match self.output.append(tasks).await {
            Ok(_) => {
                processed.insert(scene);
                info!(
                    "[Success] Scene {:04} written to {}",
                    index,
                    self.output.path().display()
                );
                UnitOutcome::succeeded(count)
            }
            Err(e) => {
                error!("[Error writing scene] Scene: {}, Error: {}", scene, e);
                UnitOutcome::failed(e)
            }
        }
    }
}
