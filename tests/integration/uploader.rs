//! Uploader integration tests.

use std::sync::Arc;

use serde_json::json;

use sqa_pipeline::core::{ScoreResult, ScoredTask, SkipReason, Source, TaskRowId};
use sqa_pipeline::datastore::TaskTable;
use sqa_pipeline::state::OutputCollection;
use sqa_pipeline::workflow::{ScoreReport, Uploader};
use sqa_pipeline::Error;

use crate::fixtures::{table_task, MockTable, TestScenes};

fn uploader(table: &Arc<MockTable>) -> Uploader {
    Uploader::new(table.clone() as Arc<dyn TaskTable>)
}

/// Given a scoring output with two good records and three unusable ones
/// When it is uploaded
/// Then exactly the two good records are applied, each once
#[tokio::test]
async fn test_uploads_only_complete_records() {
    let scenes = TestScenes::new();
    let path = scenes.output("scores.json");
    std::fs::write(
        &path,
        json!([
            { "id": 1, "score": 0.75, "sceneid": "scene0000_00", "source": "gemini" },
            { "score": 0.5, "sceneid": "scene0000_00" },
            { "id": 3, "sceneid": "scene0000_00" },
            { "id": "row-4", "score": 0.0 },
            { "id": null, "score": 1.0 },
        ])
        .to_string(),
    )
    .unwrap();

    let table = Arc::new(MockTable::new(Vec::new()));
    let summary = uploader(&table).run(&path).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped_for(SkipReason::MissingIdOrScore), 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        table.updates(),
        vec![
            (TaskRowId::Int(1), 0.75),
            (TaskRowId::Text("row-4".to_string()), 0.0)
        ]
    );
}

/// A failed update is logged and the remaining records still upload.
#[tokio::test]
async fn test_failed_update_does_not_abort() {
    let scenes = TestScenes::new();
    let path = scenes.output("scores.json");
    std::fs::write(
        &path,
        json!([
            { "id": 1, "score": 0.1 },
            { "id": 2, "score": 0.2 },
            { "id": 3, "score": 0.3 },
        ])
        .to_string(),
    )
    .unwrap();

    let table = Arc::new(MockTable::new(Vec::new()).failing_update(TaskRowId::Int(2)));
    let summary = uploader(&table).run(&path).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        table.updates(),
        vec![(TaskRowId::Int(1), 0.1), (TaskRowId::Int(3), 0.3)]
    );
}

/// Records written by the scorer upload as-is.
#[tokio::test]
async fn test_uploads_scorer_output() {
    let scenes = TestScenes::new();
    let path = scenes.output("gemini_scoring_output.json");
    let records: Vec<ScoredTask> = (1..=3)
        .map(|id| {
            ScoredTask::new(
                &table_task(id, 0, Source::Sqa3d),
                ScoreResult {
                    score: id as f64 / 4.0,
                    criteria_list: vec![2],
                    explanation: "ok".to_string(),
                },
            )
        })
        .collect();
    OutputCollection::new(&path).append_sync(records).unwrap();

    let table = Arc::new(MockTable::new(Vec::new()));
    let summary = uploader(&table).run(&path).await.unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(
        table.updates(),
        vec![
            (TaskRowId::Int(1), 0.25),
            (TaskRowId::Int(2), 0.5),
            (TaskRowId::Int(3), 0.75)
        ]
    );

    let report = ScoreReport::load(&path).await.unwrap();
    let sqa3d = report.get("sqa3d").unwrap();
    assert_eq!(sqa3d.scored, 3);
    assert!((sqa3d.mean_score.unwrap() - 0.5).abs() < 1e-9);
}

/// An unreadable input file fails the command before any update.
#[tokio::test]
async fn test_unreadable_input_is_fatal() {
    let scenes = TestScenes::new();
    let path = scenes.output("scores.json");
    std::fs::write(&path, "{\"id\": 1, \"score\": 0.5}").unwrap();

    let table = Arc::new(MockTable::new(Vec::new()));
    let err = uploader(&table).run(&path).await.unwrap_err();

    assert!(matches!(err, Error::Json(_)));
    assert!(table.updates().is_empty());
}

/// A missing input file is fatal too.
#[tokio::test]
async fn test_missing_input_is_fatal() {
    let scenes = TestScenes::new();
    let table = Arc::new(MockTable::new(Vec::new()));
    let err = uploader(&table)
        .run(&scenes.output("absent.json"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(table.updates().is_empty());
}

/// An empty array uploads nothing.
#[tokio::test]
async fn test_empty_input() {
    let scenes = TestScenes::new();
    let path = scenes.output("scores.json");
    std::fs::write(&path, "[]").unwrap();

    let table = Arc::new(MockTable::new(Vec::new()));
    let summary = uploader(&table).run(&path).await.unwrap();

    assert_eq!(summary.total(), 0);
    assert!(table.updates().is_empty());
}
