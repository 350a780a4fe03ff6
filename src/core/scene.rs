//! Scene identifiers and the on-disk layout of per-scene inputs.
//!
//! Every scene has a first-person video at `<video_dir>/<sceneid>.mp4` and a
//! top-down image at `<bird_dir>/<sceneid>_bird.png`. Both must exist before
//! a scene can be sent to the model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::{Error, Result};

/// Identifier of a captured scene, e.g. `scene0001_00`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    /// Build the identifier for a numeric scene index (first capture only).
    pub fn from_index(index: u32) -> Self {
        Self(format!("scene{:04}_00", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directories holding scene videos and bird's-eye images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneLayout {
    pub video_dir: PathBuf,
    pub bird_dir: PathBuf,
}

impl SceneLayout {
    pub fn new(video_dir: impl Into<PathBuf>, bird_dir: impl Into<PathBuf>) -> Self {
        Self {
            video_dir: video_dir.into(),
            bird_dir: bird_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.video_dir, &config.bird_dir)
    }

    pub fn video_path(&self, scene: &SceneId) -> PathBuf {
        self.video_dir.join(format!("{}.mp4", scene))
    }

    pub fn image_path(&self, scene: &SceneId) -> PathBuf {
        self.bird_dir.join(format!("{}_bird.png", scene))
    }

    pub fn inputs(&self, scene: &SceneId) -> SceneInputs {
        SceneInputs {
            scene: scene.clone(),
            video: self.video_path(scene),
            image: self.image_path(scene),
        }
    }
}

/// The pair of files the model needs for one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneInputs {
    pub scene: SceneId,
    pub video: PathBuf,
    pub image: PathBuf,
}

impl SceneInputs {
    /// Names of the inputs that are not on disk.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !is_file(&self.video) {
            missing.push("video");
        }
        if !is_file(&self.image) {
            missing.push("image");
        }
        missing
    }

    pub fn ensure_present(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::MissingInputs {
            scene: self.scene.to_string(),
            missing: missing.join(", "),
        })
    }
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}
