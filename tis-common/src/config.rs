//! Configuration loading and resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Default pending-review expiry (30 minutes)
pub const DEFAULT_REVIEW_TIMEOUT_SECS: u64 = 1800;

/// Default tolerance when comparing summed course credits to the degree total
pub const DEFAULT_CREDIT_TOLERANCE: f64 = 0.01;

/// Default per-file upload limit (5 MiB)
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Default maximum number of files per upload call
pub const DEFAULT_MAX_FILES: usize = 300;

/// LLM settings as they appear in TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// OCR command settings as they appear in TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrSection {
    pub image_command: Option<String>,
    pub pdf_command: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "tis_ingest=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Raw TOML file contents; every field optional
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
    pub upload_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub categories_file: Option<PathBuf>,
    pub review_timeout_secs: Option<u64>,
    pub credit_tolerance: Option<f64>,
    pub max_file_size_bytes: Option<usize>,
    pub max_files: Option<usize>,
    pub llm: LlmSection,
    pub ocr: OcrSection,
    pub logging: LoggingConfig,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
}

/// Resolved LLM settings
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

/// Resolved OCR command settings
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    pub image_command: String,
    pub pdf_command: String,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub work_dir: PathBuf,
    pub categories_file: PathBuf,
    pub review_timeout_secs: u64,
    pub credit_tolerance: f64,
    pub max_file_size_bytes: usize,
    pub max_files: usize,
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Compiled defaults rooted at `data_dir`
    pub fn defaults_in(data_dir: &Path) -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            database_path: data_dir.join("tis.db"),
            upload_dir: data_dir.join("uploads"),
            work_dir: data_dir.join("work"),
            categories_file: data_dir.join("course_categories.json"),
            review_timeout_secs: DEFAULT_REVIEW_TIMEOUT_SECS,
            credit_tolerance: DEFAULT_CREDIT_TOLERANCE,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_files: DEFAULT_MAX_FILES,
            llm: LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                temperature: 0.3,
            },
            ocr: OcrConfig {
                image_command: "tesseract".to_string(),
                pdf_command: "pdftotext".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Resolve configuration from CLI, environment, TOML file and defaults
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let toml_config = match locate_config_file(cli)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            None => {
                warn!("No configuration file found, using environment and defaults");
                TomlConfig::default()
            }
        };

        Self::merge(cli, &toml_config, &default_data_dir())
    }

    /// Merge the layers; split out from `resolve` so tests can pin the data dir
    pub fn merge(cli: &CliOverrides, toml: &TomlConfig, data_dir: &Path) -> Result<Self> {
        let defaults = Self::defaults_in(data_dir);

        let bind_address = cli
            .bind_address
            .clone()
            .or_else(|| env_string("TIS_BIND_ADDRESS"))
            .or_else(|| toml.bind_address.clone())
            .unwrap_or(defaults.bind_address);

        let database_path = cli
            .database_path
            .clone()
            .or_else(|| env_string("TIS_DATABASE_PATH").map(PathBuf::from))
            .or_else(|| toml.database_path.clone())
            .unwrap_or(defaults.database_path);

        let upload_dir = env_string("TIS_UPLOAD_DIR")
            .map(PathBuf::from)
            .or_else(|| toml.upload_dir.clone())
            .unwrap_or(defaults.upload_dir);

        let work_dir = env_string("TIS_WORK_DIR")
            .map(PathBuf::from)
            .or_else(|| toml.work_dir.clone())
            .unwrap_or(defaults.work_dir);

        let categories_file = env_string("TIS_CATEGORIES_FILE")
            .map(PathBuf::from)
            .or_else(|| toml.categories_file.clone())
            .unwrap_or(defaults.categories_file);

        let review_timeout_secs = env_parsed::<u64>("TIS_REVIEW_TIMEOUT_SECS")?
            .or(toml.review_timeout_secs)
            .unwrap_or(defaults.review_timeout_secs);

        let credit_tolerance = toml.credit_tolerance.unwrap_or(defaults.credit_tolerance);
        if !(credit_tolerance >= 0.0) {
            return Err(Error::Config(format!(
                "credit_tolerance must be non-negative, got {}",
                credit_tolerance
            )));
        }

        let llm = LlmConfig {
            base_url: env_string("TIS_LLM_BASE_URL")
                .or_else(|| toml.llm.base_url.clone())
                .unwrap_or(defaults.llm.base_url),
            api_key: env_string("TIS_LLM_API_KEY")
                .or_else(|| env_string("OPENAI_API_KEY"))
                .or_else(|| toml.llm.api_key.clone())
                .filter(|k| !k.trim().is_empty()),
            model: env_string("TIS_LLM_MODEL")
                .or_else(|| toml.llm.model.clone())
                .unwrap_or(defaults.llm.model),
            temperature: toml.llm.temperature.unwrap_or(defaults.llm.temperature),
        };

        let ocr = OcrConfig {
            image_command: toml
                .ocr
                .image_command
                .clone()
                .unwrap_or(defaults.ocr.image_command),
            pdf_command: toml
                .ocr
                .pdf_command
                .clone()
                .unwrap_or(defaults.ocr.pdf_command),
        };

        Ok(Self {
            bind_address,
            database_path,
            upload_dir,
            work_dir,
            categories_file,
            review_timeout_secs,
            credit_tolerance,
            max_file_size_bytes: toml
                .max_file_size_bytes
                .unwrap_or(defaults.max_file_size_bytes),
            max_files: toml.max_files.unwrap_or(defaults.max_files),
            llm,
            ocr,
            logging: toml.logging.clone(),
        })
    }

    /// Create upload and work directories, and the database's parent directory
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.work_dir)?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write a TOML config file, creating the parent directory if needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Platform config file location: `<config_dir>/tis/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tis").join("config.toml"))
}

/// Platform data directory: `<data_local_dir>/tis`
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tis"))
        .unwrap_or_else(|| PathBuf::from("./tis_data"))
}

/// Explicit paths must exist; the platform default is optional
fn locate_config_file(cli: &CliOverrides) -> Result<Option<PathBuf>> {
    let explicit = cli
        .config_path
        .clone()
        .or_else(|| env_string("TIS_CONFIG").map(PathBuf::from));

    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    Ok(default_config_path().filter(|p| p.exists()))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} is invalid ({}): {}", name, raw, e))),
        None => Ok(None),
    }
}
