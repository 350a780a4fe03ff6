//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Temporary scene directories with video and bird's-eye files
//! - A scripted in-memory model client
//! - An in-memory task table that records updates

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use sqa_pipeline::core::{SceneId, SceneLayout, Source, SqaTask, TaskRowId};
use sqa_pipeline::datastore::TaskTable;
use sqa_pipeline::orchestration::{ModelClient, ModelRequest};
use sqa_pipeline::{Error, Result};

/// A temporary working directory with `video/` and `bird/` subdirectories.
pub struct TestScenes {
    /// Keeps the directory alive for the duration of the test.
    pub temp_dir: TempDir,
    pub layout: SceneLayout,
}

impl TestScenes {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let layout = SceneLayout::new(temp_dir.path().join("video"), temp_dir.path().join("bird"));
        std::fs::create_dir_all(&layout.video_dir).expect("Failed to create video dir");
        std::fs::create_dir_all(&layout.bird_dir).expect("Failed to create bird dir");
        Self { temp_dir, layout }
    }

    /// Create both input files for scene `index`.
    pub fn add_scene(&self, index: u32) -> SceneId {
        let scene = SceneId::from_index(index);
        self.add_video(&scene);
        self.add_image(&scene);
        scene
    }

    pub fn add_video(&self, scene: &SceneId) {
        std::fs::write(self.layout.video_path(scene), b"\x00\x00\x00\x18ftypmp42")
            .expect("Failed to write video");
    }

    pub fn add_image(&self, scene: &SceneId) {
        std::fs::write(self.layout.image_path(scene), b"\x89PNG\r\n\x1a\n")
            .expect("Failed to write image");
    }

    /// Path of an output file inside the temp directory.
    pub fn output(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

type Responder = dyn Fn(&ModelRequest) -> Result<String> + Send + Sync;

/// A model client that answers from a closure and records every request.
///
/// Tracks how many calls were in flight at once so tests can check the
/// worker pool's bound.
pub struct MockModel {
    respond: Box<Responder>,
    delay: Duration,
    requests: Mutex<Vec<ModelRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockModel {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&ModelRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self::with_delay(Duration::ZERO, respond)
    }

    pub fn with_delay<F>(delay: Duration, respond: F) -> Arc<Self>
    where
        F: Fn(&ModelRequest) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            delay,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// A model that always returns `text`.
    pub fn fixed(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.respond)(request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A three-example generation response for `scene`.
pub fn generation_response(scene: &str) -> String {
    json!({
        "situation_description": [
            format!("{}: I am sitting on the bed facing the desk.", scene),
            format!("{}: I am standing by the door.", scene),
            format!("{}: I just turned on the lamp.", scene),
        ],
        "question": [
            "What is on my left?",
            "How many chairs can I see?",
            "Which way is the window?",
        ],
        "answer": ["nightstand", "two", "behind me"],
    })
    .to_string()
}

/// A valid rubric response satisfying `criteria`.
pub fn score_response(criteria: &[u32]) -> String {
    json!({
        "score": criteria.len() as f64 * 0.2,
        "criteria_list": criteria,
        "explanation": "Situation is clear; answer matches the scene.",
    })
    .to_string()
}

/// An in-memory task table.
pub struct MockTable {
    tasks: Vec<SqaTask>,
    fetch_error: Option<String>,
    failing_ids: HashSet<TaskRowId>,
    updates: Mutex<Vec<(TaskRowId, f64)>>,
}

impl MockTable {
    pub fn new(tasks: Vec<SqaTask>) -> Self {
        Self {
            tasks,
            fetch_error: None,
            failing_ids: HashSet::new(),
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Make `fetch_tasks` fail with `message`.
    pub fn failing_fetch(mut self, message: &str) -> Self {
        self.fetch_error = Some(message.to_string());
        self
    }

    /// Make `apply_score` fail for `id`.
    pub fn failing_update(mut self, id: TaskRowId) -> Self {
        self.failing_ids.insert(id);
        self
    }

    /// Successful updates, in call order.
    pub fn updates(&self) -> Vec<(TaskRowId, f64)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskTable for MockTable {
    async fn fetch_tasks(&self) -> Result<Vec<SqaTask>> {
        match &self.fetch_error {
            Some(message) => Err(Error::Datastore(message.clone())),
            None => Ok(self.tasks.clone()),
        }
    }

    async fn apply_score(&self, id: &TaskRowId, score: f64) -> Result<()> {
        if self.failing_ids.contains(id) {
            return Err(Error::Datastore(format!("update of {} rejected", id)));
        }
        self.updates.lock().unwrap().push((id.clone(), score));
        Ok(())
    }
}

/// A table row for scene `scene` with integer id `id`.
pub fn table_task(id: i64, scene: u32, source: Source) -> SqaTask {
    SqaTask {
        id: Some(TaskRowId::Int(id)),
        sceneid: SceneId::from_index(scene),
        situation: format!("Situation {}", id),
        question: format!("Question {}?", id),
        answer: format!("Answer {}", id),
        split: None,
        source,
    }
}

/// `per_source` rows of each scored source for every scene in `scenes`.
pub fn table_tasks(scenes: std::ops::Range<u32>, per_source: usize) -> Vec<SqaTask> {
    let mut next_id = 0;
    let mut tasks = Vec::new();
    for scene in scenes {
        for source in [Source::Sqa3d, Source::Gemini] {
            for _ in 0..per_source {
                next_id += 1;
                tasks.push(table_task(next_id, scene, source.clone()));
            }
        }
    }
    tasks
}
