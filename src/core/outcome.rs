//! Outcome of one unit of batch work and per-run tallies.
//!
//! Every unit (a scene, a task to score, a record to upload) starts pending
//! and ends in exactly one terminal state. Nothing is retried.

use serde::Serialize;
use std::collections::BTreeMap;

/// Terminal state of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum UnitOutcome {
    /// The unit produced output.
    Succeeded {
        /// Number of records written for this unit.
        records: usize,
    },
    /// The unit was not attempted.
    Skipped {
        /// Why the unit was skipped.
        reason: SkipReason,
    },
    /// The unit was attempted and failed.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Why a unit of work was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Output already holds this scene.
    AlreadyProcessed,
    /// The scene's video or image is not on disk.
    MissingInputs,
    /// A required field of the record is empty.
    IncompleteRecord,
    /// The record has no row id or no score to upload.
    MissingIdOrScore,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::MissingInputs => write!(f, "missing input files"),
            SkipReason::IncompleteRecord => write!(f, "incomplete record"),
            SkipReason::MissingIdOrScore => write!(f, "missing id or score"),
        }
    }
}

impl std::fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitOutcome::Succeeded { records } => write!(f, "succeeded ({} records)", records),
            UnitOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            UnitOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

impl UnitOutcome {
    pub fn succeeded(records: usize) -> Self {
        Self::Succeeded { records }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Tally of unit outcomes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Total records written across succeeded units.
    pub records: usize,
    /// Skips broken down by reason.
    pub skipped_by: BTreeMap<SkipReason, usize>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Succeeded { records } => {
                self.succeeded += 1;
                self.records += records;
            }
            UnitOutcome::Skipped { reason } => {
                self.skipped += 1;
                *self.skipped_by.entry(*reason).or_default() += 1;
            }
            UnitOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped_by.get(&reason).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed, {} records written",
            self.succeeded, self.skipped, self.failed, self.records
        )?;
        if !self.skipped_by.is_empty() {
            let reasons: Vec<String> = self
                .skipped_by
                .iter()
                .map(|(reason, n)| format!("{}: {}", reason, n))
                .collect();
            write!(f, " (skipped {})", reasons.join(", "))?;
        }
        Ok(())
    }
}
