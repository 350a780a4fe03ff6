//! Core domain models for the SQA pipeline.
//!
//! Scenes and their input files, SQA tasks and rubric scores, and the
//! terminal outcomes of batch units.

pub mod outcome;
pub mod scene;
pub mod task;

pub use outcome::{RunSummary, SkipReason, UnitOutcome};
pub use scene::{SceneId, SceneInputs, SceneLayout};
pub use task::{
    ScoreResult, ScoredTask, Source, SqaTask, TaskRowId, CRITERION_WEIGHT, RUBRIC_CRITERIA,
};
