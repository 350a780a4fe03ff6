//! Generator integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sqa_pipeline::core::{SceneId, SkipReason, Source, SqaTask};
use sqa_pipeline::orchestration::ModelClient;
use sqa_pipeline::state::OutputCollection;
use sqa_pipeline::workflow::Generator;
use sqa_pipeline::Error;

use crate::fixtures::{generation_response, MockModel, TestScenes};

const MODEL: &str = "gemini-test";

fn scene_response_model() -> Arc<MockModel> {
    MockModel::new(|request| {
        let stem = request
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(generation_response(&stem))
    })
}

fn generator(scenes: &TestScenes, model: Arc<MockModel>, output: &str) -> Generator {
    Generator::new(
        model as Arc<dyn ModelClient>,
        MODEL,
        scenes.layout.clone(),
        OutputCollection::new(scenes.output(output)),
    )
}

/// Given scenes 0..3 where scene 2 has no image
/// When the generator runs
/// Then scenes 0 and 1 each contribute three records and scene 2 none
#[tokio::test]
async fn test_generates_three_records_per_scene() {
    let scenes = TestScenes::new();
    scenes.add_scene(0);
    scenes.add_scene(1);
    scenes.add_video(&SceneId::from_index(2));

    let model = scene_response_model();
    let summary = generator(&scenes, model.clone(), "output.json").run(0..3).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.records, 6);
    assert_eq!(summary.skipped_for(SkipReason::MissingInputs), 1);
    assert_eq!(model.call_count(), 2, "scene without image must not reach the model");

    let records: Vec<SqaTask> = OutputCollection::new(scenes.output("output.json"))
        .load_sync()
        .unwrap();
    let mut per_scene: HashMap<SceneId, usize> = HashMap::new();
    for record in &records {
        *per_scene.entry(record.sceneid.clone()).or_default() += 1;
        assert_eq!(record.source, Source::Gemini);
        assert_eq!(record.split.as_deref(), Some("train"));
        assert!(record.situation.starts_with(record.sceneid.as_str()));
    }
    assert_eq!(per_scene.get(&SceneId::from_index(0)), Some(&3));
    assert_eq!(per_scene.get(&SceneId::from_index(1)), Some(&3));
    assert!(!per_scene.contains_key(&SceneId::from_index(2)));
}

/// Given scenes 0..3 where only scene 1 has both inputs
/// When the model returns a three-example body
/// Then the output holds exactly three records, all for scene 1
#[tokio::test]
async fn test_only_complete_scene_is_generated() {
    let scenes = TestScenes::new();
    scenes.add_image(&SceneId::from_index(0));
    scenes.add_scene(1);
    scenes.add_video(&SceneId::from_index(2));

    let model = MockModel::fixed(&generation_response("room"));
    let summary = generator(&scenes, model.clone(), "output.json").run(0..3).await;

    assert_eq!(summary.skipped_for(SkipReason::MissingInputs), 2);
    assert_eq!(model.call_count(), 1);

    let records: Vec<SqaTask> = OutputCollection::new(scenes.output("output.json"))
        .load_sync()
        .unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.sceneid.as_str() == "scene0001_00"));
}

/// The request carries the scene's video and image, the generation prompt
/// and the three-array schema.
#[tokio::test]
async fn test_request_contents() {
    let scenes = TestScenes::new();
    let scene = scenes.add_scene(5);

    let model = scene_response_model();
    generator(&scenes, model.clone(), "output.json").run(5..6).await;

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.model, MODEL);
    assert_eq!(request.video, scenes.layout.video_path(&scene));
    assert_eq!(request.image, scenes.layout.image_path(&scene));
    assert!(request.prompt.contains("situation"));
    let required = request.response_schema["required"].as_array().unwrap();
    assert_eq!(required.len(), 3);
}

/// Given a completed run
/// When the generator runs again over the same range
/// Then no scene is sent to the model twice and no scene id is duplicated
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let scenes = TestScenes::new();
    for index in 0..4 {
        scenes.add_scene(index);
    }

    let first_model = scene_response_model();
    let first = generator(&scenes, first_model.clone(), "output.json").run(0..4).await;
    assert_eq!(first.succeeded, 4);

    let second_model = scene_response_model();
    let second = generator(&scenes, second_model.clone(), "output.json").run(0..4).await;
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.skipped_for(SkipReason::AlreadyProcessed), 4);
    assert_eq!(second_model.call_count(), 0);

    let records: Vec<SqaTask> = OutputCollection::new(scenes.output("output.json"))
        .load_sync()
        .unwrap();
    assert_eq!(records.len(), 12);
    let distinct: HashSet<_> = records.iter().map(|r| r.sceneid.clone()).collect();
    assert_eq!(distinct.len(), 4);
}

/// Given an output file that already holds scene 1
/// When scenes 0..3 are generated
/// Then only scenes 0 and 2 are processed and existing records are kept
#[tokio::test]
async fn test_resumes_from_existing_output() {
    let scenes = TestScenes::new();
    for index in 0..3 {
        scenes.add_scene(index);
    }
    let output = OutputCollection::new(scenes.output("output.json"));
    output
        .append_sync(vec![SqaTask::generated(
            SceneId::from_index(1),
            "earlier situation",
            "earlier question",
            "earlier answer",
        )])
        .unwrap();

    let model = scene_response_model();
    let summary = generator(&scenes, model.clone(), "output.json").run(0..3).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped_for(SkipReason::AlreadyProcessed), 1);
    let records: Vec<SqaTask> = output.load_sync().unwrap();
    assert_eq!(records.len(), 7);
    assert_eq!(records[0].situation, "earlier situation");
}

/// A failing scene is logged and skipped; the next scene still runs.
#[tokio::test]
async fn test_model_failure_does_not_stop_run() {
    let scenes = TestScenes::new();
    for index in 0..3 {
        scenes.add_scene(index);
    }

    let model = MockModel::new(|request| {
        if request.video.to_string_lossy().contains("scene0001_00") {
            Err(Error::Model("quota exceeded".to_string()))
        } else {
            Ok(generation_response("ok"))
        }
    });
    let summary = generator(&scenes, model.clone(), "output.json").run(0..3).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(model.call_count(), 3);

    // The failed scene is retried on the next run.
    let retry = scene_response_model();
    let summary = generator(&scenes, retry.clone(), "output.json").run(0..3).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(retry.call_count(), 1);
}

/// Unequal arrays are a malformed response and write nothing.
#[tokio::test]
async fn test_malformed_response_writes_nothing() {
    let scenes = TestScenes::new();
    scenes.add_scene(0);

    let model = MockModel::fixed(
        r#"{"situation_description": ["a", "b", "c"], "question": ["q"], "answer": ["x", "y", "z"]}"#,
    );
    let summary = generator(&scenes, model, "output.json").run(0..1).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.records, 0);
    assert!(!scenes.output("output.json").exists());
}

/// An unparseable output file is treated as empty for skipping; the append
/// then fails per scene without touching the file.
#[tokio::test]
async fn test_corrupt_output_file() {
    let scenes = TestScenes::new();
    scenes.add_scene(0);
    std::fs::write(scenes.output("output.json"), "[{ not json").unwrap();

    let model = scene_response_model();
    let summary = generator(&scenes, model.clone(), "output.json").run(0..1).await;

    assert_eq!(model.call_count(), 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        std::fs::read_to_string(scenes.output("output.json")).unwrap(),
        "[{ not json"
    );
}

/// An empty range does nothing.
#[tokio::test]
async fn test_empty_range() {
    let scenes = TestScenes::new();
    let model = scene_response_model();
    let summary = generator(&scenes, model.clone(), "output.json").run(3..3).await;

    assert_eq!(summary.total(), 0);
    assert_eq!(model.call_count(), 0);
}
