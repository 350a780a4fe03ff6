//! Task data model.
//!
//! A task is one Situation/Question/Answer triplet tied to a scene. Tasks
//! either come out of the generator (source `gemini`) or already live in the
//! hosted table (source `sqa3d`). The scorer attaches a rubric result to a
//! task to produce a [`ScoredTask`].

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::scene::SceneId;
use crate::{Error, Result};

/// Number of rubric criteria.
pub const RUBRIC_CRITERIA: u32 = 5;
/// Points awarded per satisfied criterion.
pub const CRITERION_WEIGHT: f64 = 0.2;

/// Primary key of a row in the hosted task table.
///
/// The table may use integer or text keys, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRowId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for TaskRowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskRowId::Int(id) => write!(f, "{}", id),
            TaskRowId::Text(id) => f.write_str(id),
        }
    }
}

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Source {
    /// Generated by the model in this pipeline.
    Gemini,
    /// Human-authored, from the SQA3D dataset.
    Sqa3d,
    /// Any other tag present in the table.
    Other(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::Gemini => "gemini",
            Source::Sqa3d => "sqa3d",
            Source::Other(tag) => tag,
        }
    }

    /// Sources the scorer samples from.
    pub fn is_scored(&self) -> bool {
        matches!(self, Source::Gemini | Source::Sqa3d)
    }
}

impl From<Option<String>> for Source {
    fn from(tag: Option<String>) -> Self {
        match tag.as_deref() {
            Some("gemini") => Source::Gemini,
            Some("sqa3d") => Source::Sqa3d,
            Some(other) => Source::Other(other.to_string()),
            None => Source::Other(String::new()),
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.as_str().to_string()
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::Other(String::new())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Situation/Question/Answer triplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqaTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskRowId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sceneid: SceneId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub situation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
    #[serde(default)]
    pub source: Source,
}

impl SqaTask {
    pub const SPLIT_TRAIN: &'static str = "train";

    /// Create a freshly generated task (no row id yet).
    pub fn generated(sceneid: SceneId, situation: &str, question: &str, answer: &str) -> Self {
        Self {
            id: None,
            sceneid,
            situation: situation.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            split: Some(Self::SPLIT_TRAIN.to_string()),
            source: Source::Gemini,
        }
    }

    /// All of scene, situation, question and answer are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.sceneid.as_str().is_empty()
            && !self.situation.trim().is_empty()
            && !self.question.trim().is_empty()
            && !self.answer.trim().is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The model's rubric verdict for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub criteria_list: Vec<u32>,
    pub explanation: String,
}

impl ScoreResult {
    /// Reject scores outside `[0, 1]`, criterion indices outside `1..=5`,
    /// and a score that is not 0.2 per satisfied criterion.
    pub fn validate(&self) -> Result<()> {
        const EPSILON: f64 = 1e-6;
        if !self.score.is_finite() || self.score < -EPSILON || self.score > 1.0 + EPSILON {
            return Err(Error::MalformedResponse(format!(
                "score {} is outside [0, 1]",
                self.score
            )));
        }
        if let Some(bad) = self
            .criteria_list
            .iter()
            .find(|&&c| c == 0 || c > RUBRIC_CRITERIA)
        {
            return Err(Error::MalformedResponse(format!(
                "criterion index {} is outside 1..={}",
                bad, RUBRIC_CRITERIA
            )));
        }
        let satisfied: BTreeSet<u32> = self.criteria_list.iter().copied().collect();
        let expected = satisfied.len() as f64 * CRITERION_WEIGHT;
        if (self.score - expected).abs() > EPSILON {
            return Err(Error::MalformedResponse(format!(
                "score {} does not match {} satisfied criteria",
                self.score,
                satisfied.len()
            )));
        }
        Ok(())
    }
}

/// A rubric result together with the task it grades.
///
/// This is the record type of the scoring output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTask {
    #[serde(flatten)]
    pub result: ScoreResult,
    pub sceneid: SceneId,
    pub source: Source,
    pub situation: String,
    pub question: String,
    pub answer: String,
    pub id: Option<TaskRowId>,
}

impl ScoredTask {
    pub fn new(task: &SqaTask, result: ScoreResult) -> Self {
        Self {
            result,
            sceneid: task.sceneid.clone(),
            source: task.source.clone(),
            situation: task.situation.clone(),
            question: task.question.clone(),
            answer: task.answer.clone(),
            id: task.id.clone(),
        }
    }
}
