//! The batch commands: generate, score, upload and report.
//!
//! Each command walks a set of units (scenes, sampled tasks, scored
//! records), records one [`UnitOutcome`](crate::core::UnitOutcome) per unit
//! and returns the run's [`RunSummary`](crate::core::RunSummary).

mod generate;
mod report;
mod sample;
mod score;
mod upload;

pub use generate::{parse_generation_response, GenerationResponse, Generator};
pub use report::{ScoreReport, SourceStats};
pub use sample::select_tasks_by_scene;
pub use score::{parse_score_response, Scorer, ScoringOptions, TaskScorer};
pub use upload::{ScoreUpdate, Uploader};
