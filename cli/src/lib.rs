pub mod prompt;

use morphometry::{ScanAxis, Segmentation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use prompt::StdinPrompt;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Image directory does not exist: {0}")]
    MissingImageDir(PathBuf),
    #[error("'workers' must be at least 1")]
    ZeroWorkers,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Preview directory name under the system temp directory
pub const DEFAULT_PREVIEW_DIR: &str = "morpho-previews";

/// One batch measurement run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MeasureConfig {
    /// Directory the batch `ID`s are resolved against
    pub image_dir: PathBuf,
    /// CSV with `ID`, `LENGTH`, `MIN_WIDTH` and `MAX_WIDTH` columns
    pub batch: PathBuf,
    /// Results CSV to write
    pub output: PathBuf,
    pub segmentation: Segmentation,
    #[serde(default)]
    pub axis: ScanAxis,
    /// Worker threads; all cores when absent
    #[serde(default)]
    pub workers: Option<usize>,
    /// Where interactive previews are saved; a temp directory when absent
    #[serde(default)]
    pub preview_dir: Option<PathBuf>,
}

impl MeasureConfig {
    /// Load MeasureConfig from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load MeasureConfig from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load MeasureConfig from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load MeasureConfig from JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ConfigError::UnsupportedFileFormat),
        }
    }

    /// Convert MeasureConfig to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert MeasureConfig to JSON string
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Directory interactive previews are written to
    pub fn preview_dir(&self) -> PathBuf {
        self.preview_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_PREVIEW_DIR))
    }

    /// Check the parts of the run that can be checked before any image is read
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if !self.image_dir.is_dir() {
            return Err(ConfigError::MissingImageDir(self.image_dir.clone()));
        }
        Ok(())
    }
}

/// JSON Schema of the run file
pub fn config_schema() -> Result<String, ConfigError> {
    let schema = schemars::schema_for!(MeasureConfig);
    Ok(serde_json::to_string_pretty(&schema)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphometry::{BackgroundPolarity, MaskParams};

    const TOML_CONFIG: &str = r#"
image_dir = "photos"
batch = "widths.csv"
output = "results.csv"
workers = 4

[segmentation]
mode = "automatic"
polarity = "light"

[segmentation.params]
blur_sigma = 2.0
"#;

    #[test]
    fn test_from_toml() {
        let config = MeasureConfig::from_toml(TOML_CONFIG).unwrap();
        assert_eq!(config.image_dir, PathBuf::from("photos"));
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.axis, ScanAxis::Horizontal);
        assert_eq!(config.preview_dir, None);

        let Segmentation::Automatic { polarity, params } = &config.segmentation else {
            panic!("expected automatic segmentation");
        };
        assert_eq!(*polarity, BackgroundPolarity::Light);
        assert_eq!(params.blur_sigma, 2.0);
        assert_eq!(params.clahe_tiles, MaskParams::default().clahe_tiles);
    }

    #[test]
    fn test_from_json_interactive() {
        let config = MeasureConfig::from_json(
            r#"{
                "image_dir": "photos",
                "batch": "widths.csv",
                "output": "out.csv",
                "axis": "vertical",
                "preview_dir": "previews",
                "segmentation": { "mode": "interactive", "initial_threshold": 40 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.axis, ScanAxis::Vertical);
        assert_eq!(
            config.segmentation,
            Segmentation::Interactive { initial_threshold: 40, max_attempts: None }
        );
    }

    #[test]
    fn test_toml_output_loads_back() {
        let config = MeasureConfig::from_toml(TOML_CONFIG).unwrap();
        let reloaded = MeasureConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_from_file_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, TOML_CONFIG).unwrap();
        assert!(MeasureConfig::from_file(&path).is_ok());

        let yaml = dir.path().join("run.yaml");
        fs::write(&yaml, "image_dir: x").unwrap();
        assert!(matches!(
            MeasureConfig::from_file(&yaml),
            Err(ConfigError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MeasureConfig::from_toml(TOML_CONFIG).unwrap();
        config.image_dir = dir.path().to_path_buf();
        assert!(config.validate().is_ok());

        config.workers = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWorkers)));

        config.workers = None;
        config.image_dir = dir.path().join("missing");
        assert!(matches!(config.validate(), Err(ConfigError::MissingImageDir(_))));
    }

    #[test]
    fn test_preview_dir_falls_back_to_temp() {
        let mut config = MeasureConfig::from_toml(TOML_CONFIG).unwrap();
        assert_eq!(config.preview_dir(), std::env::temp_dir().join(DEFAULT_PREVIEW_DIR));

        config.preview_dir = Some(PathBuf::from("previews"));
        assert_eq!(config.preview_dir(), PathBuf::from("previews"));
    }

    #[test]
    fn test_schema_names_fields() {
        let schema = config_schema().unwrap();
        for field in ["image_dir", "batch", "output", "segmentation", "preview_dir"] {
            assert!(schema.contains(field), "schema is missing {field}");
        }
    }
}
