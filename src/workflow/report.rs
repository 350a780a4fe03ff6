//! Per-source score averages over a scoring output file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::state::OutputCollection;
use crate::Result;

/// Score statistics for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStats {
    pub source: String,
    /// Records with this source.
    pub records: usize,
    /// Records that carried a numeric score.
    pub scored: usize,
    pub mean_score: Option<f64>,
}

/// Averages for every source in a scoring output, ordered by source name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreReport {
    pub sources: Vec<SourceStats>,
}

impl ScoreReport {
    pub fn from_records(records: &[Value]) -> Self {
        let mut totals: BTreeMap<String, (usize, usize, f64)> = BTreeMap::new();
        for record in records {
            let source = record
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let entry = totals.entry(source).or_default();
            entry.0 += 1;
            if let Some(score) = record.get("score").and_then(Value::as_f64) {
                entry.1 += 1;
                entry.2 += score;
            }
        }

        let sources = totals
            .into_iter()
            .map(|(source, (records, scored, sum))| SourceStats {
                source,
                records,
                scored,
                mean_score: (scored > 0).then(|| sum / scored as f64),
            })
            .collect();
        Self { sources }
    }

    /// Load `path` and summarize it. The file must exist.
    pub async fn load(path: &Path) -> Result<Self> {
        let records = OutputCollection::<Value>::new(path).load_existing().await?;
        Ok(Self::from_records(&records))
    }

    pub fn get(&self, source: &str) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.source == source)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<16} {:>8} {:>8} {:>10}", "SOURCE", "RECORDS", "SCORED", "MEAN")?;
        for stats in &self.sources {
            let source = if stats.source.is_empty() {
                "(none)"
            } else {
                stats.source.as_str()
            };
            let mean = stats
                .mean_score
                .map(|m| format!("{:.4}", m))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<16} {:>8} {:>8} {:>10}",
                source, stats.records, stats.scored, mean
            )?;
        }
        Ok(())
    }
}
