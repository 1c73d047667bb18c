use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::evaluation::{EngineErrorPolicy, EvaluationSettings, Technique};
use crate::faces::{MatchStrategy, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one subfolder per evaluated scene
    #[serde(default = "default_images_root")]
    pub images_root: PathBuf,

    /// Subfolders to evaluate; empty means every subfolder of `images_root`
    #[serde(default)]
    pub folders: Vec<String>,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Maximum center-to-center distance (pixels) for two faces to pair
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,

    #[serde(default)]
    pub strategy: MatchStrategy,
}

fn default_distance_threshold() -> f32 {
    DEFAULT_DISTANCE_THRESHOLD
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            strategy: MatchStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Cosine similarity above which a face counts as recognized.
    /// Depends on the embedding model; retune when swapping models.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default)]
    pub on_engine_error: EngineErrorPolicy,
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            on_engine_error: EngineErrorPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where ONNX models are cached; defaults to the local data directory
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    #[serde(default = "default_detection_confidence")]
    pub detection_confidence: f32,

    #[serde(default = "default_nms_threshold")]
    pub nms_threshold: f32,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_detection_confidence() -> f32 {
    0.7
}

fn default_nms_threshold() -> f32 {
    0.3
}

fn default_intra_threads() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: None,
            detection_confidence: default_detection_confidence(),
            nms_threshold: default_nms_threshold(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl EngineConfig {
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from(".local/share"))
                .join("facecloak")
                .join("models")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "default_original_keyword")]
    pub original_keyword: String,

    #[serde(default = "default_pixelation_keyword")]
    pub pixelation_keyword: String,

    #[serde(default = "default_occlusion_keyword")]
    pub occlusion_keyword: String,

    #[serde(default = "default_blur_keyword")]
    pub blur_keyword: String,
}

fn default_image_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
}

fn default_original_keyword() -> String {
    "original".to_string()
}

fn default_pixelation_keyword() -> String {
    "pixel".to_string()
}

fn default_occlusion_keyword() -> String {
    "black".to_string()
}

fn default_blur_keyword() -> String {
    "blurr".to_string()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            original_keyword: default_original_keyword(),
            pixelation_keyword: default_pixelation_keyword(),
            occlusion_keyword: default_occlusion_keyword(),
            blur_keyword: default_blur_keyword(),
        }
    }
}

impl ScannerConfig {
    /// Filename fragment identifying the variant made with `technique`
    pub fn keyword(&self, technique: Technique) -> &str {
        match technique {
            Technique::Pixelation => &self.pixelation_keyword,
            Technique::Occlusion => &self.occlusion_keyword,
            Technique::Blur => &self.blur_keyword,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    #[default]
    Stderr,
    File,
    Journald,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub backend: LogBackend,

    /// Directory for the file backend; defaults to the local data directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_images_root() -> PathBuf {
    PathBuf::from("images")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_root: default_images_root(),
            folders: Vec::new(),
            matching: MatchingConfig::default(),
            scoring: ScoringConfig::default(),
            engine: EngineConfig::default(),
            scanner: ScannerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from `FACECLOAK_CONFIG` or the default location; defaults if absent
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("FACECLOAK_CONFIG") {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facecloak")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let distance = self.matching.distance_threshold;
        if !distance.is_finite() || distance <= 0.0 {
            return Err(ConfigError::InvalidDistanceThreshold(distance));
        }

        let similarity = self.scoring.similarity_threshold;
        if !(-1.0..=1.0).contains(&similarity) {
            return Err(ConfigError::InvalidSimilarityThreshold(similarity));
        }

        if self.scanner.original_keyword.is_empty() {
            return Err(ConfigError::EmptyKeyword("original"));
        }
        for technique in Technique::ALL {
            if self.scanner.keyword(technique).is_empty() {
                return Err(ConfigError::EmptyKeyword(technique.name()));
            }
        }

        Ok(())
    }

    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            distance_threshold: self.matching.distance_threshold,
            similarity_threshold: self.scoring.similarity_threshold,
            strategy: self.matching.strategy,
            on_engine_error: self.scoring.on_engine_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_thresholds() {
        let config = Config::default();
        let settings = config.evaluation_settings();

        assert_eq!(settings.distance_threshold, 50.0);
        assert_eq!(settings.similarity_threshold, 0.7);
        assert_eq!(settings.strategy, MatchStrategy::Greedy);
        assert_eq!(settings.on_engine_error, EngineErrorPolicy::FailOpen);
        assert_eq!(config.scanner.keyword(Technique::Occlusion), "black");
        assert_eq!(config.scanner.keyword(Technique::Blur), "blurr");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            folders = ["male", "multiple"]

            [matching]
            strategy = "optimal"

            [scoring]
            on_engine_error = "propagate"
            "#,
        )
        .unwrap();

        assert_eq!(config.folders, vec!["male", "multiple"]);
        assert_eq!(config.matching.strategy, MatchStrategy::Optimal);
        assert_eq!(config.matching.distance_threshold, 50.0);
        assert_eq!(config.scoring.on_engine_error, EngineErrorPolicy::Propagate);
        assert_eq!(config.scoring.similarity_threshold, 0.7);
        assert_eq!(config.images_root, PathBuf::from("images"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.matching.distance_threshold = 80.0;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.matching.distance_threshold, 80.0);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.matching.distance_threshold = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDistanceThreshold(_))));

        config.matching.distance_threshold = 50.0;
        config.scoring.similarity_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSimilarityThreshold(_))));

        config.scoring.similarity_threshold = 0.7;
        config.scanner.blur_keyword.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyKeyword("blur"))));
    }
}
