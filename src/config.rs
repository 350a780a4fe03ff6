use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_GENERATOR_MODEL: &str = "gemini-2.5-pro-preview-06-05";
pub const DEFAULT_SCORER_MODEL: &str = "gemini-2.5-flash-preview-05-20";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Settings shared by the `generate`, `score`, `upload` and `report` commands.
///
/// Every field has a default, so a partial `sqa.toml` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video_dir: PathBuf,
    pub bird_dir: PathBuf,
    pub generation_output: PathBuf,
    pub scoring_output: PathBuf,
    pub scene_start: u32,
    pub scene_end: u32,
    pub generator_model: String,
    pub scorer_model: String,
    pub table: String,
    pub sample_size: usize,
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub page_size: usize,
    pub gemini_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("./video"),
            bird_dir: PathBuf::from("./bird"),
            generation_output: PathBuf::from("output.json"),
            scoring_output: PathBuf::from("gemini_scoring_output.json"),
            scene_start: 0,
            scene_end: 707,
            generator_model: DEFAULT_GENERATOR_MODEL.to_string(),
            scorer_model: DEFAULT_SCORER_MODEL.to_string(),
            table: "sqa_tasks".to_string(),
            sample_size: 3,
            workers: 4,
            request_timeout_secs: 600,
            page_size: 1000,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn sqa_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".sqa"))
    }

    pub fn user_config_path() -> Result<PathBuf> {
        Ok(Self::sqa_dir()?.join("sqa.toml"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `./sqa.toml` is tried, then
    /// `~/.sqa/sqa.toml`, then the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        let local = PathBuf::from("sqa.toml");
        if local.exists() {
            return Self::load_from(&local);
        }
        if let Ok(user) = Self::user_config_path() {
            if user.exists() {
                return Self::load_from(&user);
            }
        }
        debug!("Config file not found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Config::load path={}", path.display());
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        debug!(
            "Config loaded: scenes={}..{}, workers={}, sample_size={}",
            config.scene_start, config.scene_end, config.workers, config.sample_size
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scene_start > self.scene_end {
            return Err(Error::Validation(format!(
                "scene_start ({}) is after scene_end ({})",
                self.scene_start, self.scene_end
            )));
        }
        if self.workers == 0 {
            return Err(Error::Validation("workers must be at least 1".to_string()));
        }
        if self.sample_size == 0 {
            return Err(Error::Validation(
                "sample_size must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(Error::Validation("page_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Credentials for the hosted services, read once at startup.
///
/// A missing value is not an error here; the client that needs it fails
/// when it is first used.
#[derive(Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl Secrets {
    pub const GEMINI_API_KEY: &'static str = "GEMINI_API_KEY";
    pub const SUPABASE_URL: &'static str = "SUPABASE_URL";
    pub const SUPABASE_KEY: &'static str = "SUPABASE_KEY";

    /// Read secrets from the environment, after loading `.env` if present.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self {
            gemini_api_key: non_empty_var(Self::GEMINI_API_KEY),
            supabase_url: non_empty_var(Self::SUPABASE_URL),
            supabase_key: non_empty_var(Self::SUPABASE_KEY),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("gemini_api_key", &mask(&self.gemini_api_key))
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &mask(&self.supabase_key))
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
