//! Per-scene task sampling for the scorer.
//!
//! Tasks are grouped by scene and by source. A scene contributes exactly
//! `per_source` tasks from each scored source, drawn at random, or nothing
//! if either source is short.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::{SceneId, Source, SqaTask};

/// Tasks of one scene, split by source.
#[derive(Debug, Default)]
struct SceneGroup {
    sqa3d: Vec<SqaTask>,
    gemini: Vec<SqaTask>,
}

/// Select `per_source` random tasks per source from every scene that has
/// at least that many of each.
///
/// Tasks with an unscored source are ignored. Scenes are visited in id
/// order, so a seeded `rng` gives a reproducible selection.
pub fn select_tasks_by_scene<R: Rng + ?Sized>(
    tasks: Vec<SqaTask>,
    per_source: usize,
    rng: &mut R,
) -> Vec<SqaTask> {
    let mut scenes: BTreeMap<SceneId, SceneGroup> = BTreeMap::new();
    for task in tasks {
        if !task.source.is_scored() {
            continue;
        }
        let group = scenes.entry(task.sceneid.clone()).or_default();
        match task.source {
            Source::Sqa3d => group.sqa3d.push(task),
            Source::Gemini => group.gemini.push(task),
            Source::Other(_) => {}
        }
    }

    let mut selected = Vec::new();
    for group in scenes.into_values() {
        if group.sqa3d.len() < per_source || group.gemini.len() < per_source {
            continue;
        }
        selected.extend(group.sqa3d.choose_multiple(rng, per_source).cloned());
        selected.extend(group.gemini.choose_multiple(rng, per_source).cloned());
    }
    selected
}
