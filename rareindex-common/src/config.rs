//! Configuration loading and root folder resolution
//!
//! The root folder holds the SQLite database (`rareindex.db`) and the media
//! directory for uploaded documents and generated previews.
//!
//! Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`RAREINDEX_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "RAREINDEX_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "rareindex.db";

/// TOML configuration shared by the server and the management commands
///
/// Every field has a built-in default so an absent or partial file is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct RareIndexConfig {
    /// Root folder override (used when no CLI argument or env var is given)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address for the lab service
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Username acting for requests without an `X-RareIndex-User` header
    #[serde(default = "default_user")]
    pub default_user: String,

    /// Media directory override (defaults to `<root>/media`)
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    /// Largest accepted report / request form upload, in MiB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub annotation: AnnotationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RareIndexConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind: default_bind(),
            default_user: default_user(),
            media_dir: None,
            max_upload_mb: default_max_upload_mb(),
            preview: PreviewConfig::default(),
            annotation: AnnotationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// DOCX preview rendering
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewConfig {
    /// `pandoc` executable; looked up on `PATH` when unset
    #[serde(default)]
    pub pandoc: Option<PathBuf>,

    /// TrueType font embedded in previews. Without one, a system DejaVu or
    /// Liberation font is tried before falling back to the PDF base fonts.
    #[serde(default)]
    pub font: Option<PathBuf>,
}

/// External annotation provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// Master switch for the background annotation queue
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub vep: bool,

    #[serde(default = "default_true")]
    pub myvariant: bool,

    /// GeneBe requires an account for sustained use, off unless asked for
    #[serde(default)]
    pub genebe: bool,

    #[serde(default = "default_vep_url")]
    pub vep_url: String,

    #[serde(default = "default_myvariant_url")]
    pub myvariant_url: String,

    #[serde(default = "default_genebe_url")]
    pub genebe_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bounded queue capacity (variants waiting for annotation)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vep: true,
            myvariant: true,
            genebe: false,
            vep_url: default_vep_url(),
            myvariant_url: default_myvariant_url(),
            genebe_url: default_genebe_url(),
            timeout_secs: default_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5780".to_string()
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_max_upload_mb() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_vep_url() -> String {
    "https://rest.ensembl.org".to_string()
}

fn default_myvariant_url() -> String {
    "https://myvariant.info".to_string()
}

fn default_genebe_url() -> String {
    "https://api.genebe.net".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RareIndexConfig {
    /// Load the TOML config from the platform location, or defaults if absent
    pub fn load() -> Self {
        match config_file_path() {
            Ok(path) => match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                debug!("No config file: {}", e);
                Self::default()
            }
        }
    }

    /// Parse a specific TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Upload body limit in bytes
    pub fn upload_limit_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Media directory for the given root folder
    pub fn media_dir(&self, root: &Path) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| root.join("media"))
    }
}

/// Resolve the root folder: CLI argument, env var, TOML, OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &RareIndexConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

/// Get the configuration file path for the platform
fn config_file_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("rareindex").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/rareindex/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("rareindex"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/rareindex"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("rareindex"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/rareindex"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("rareindex"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\rareindex"))
    } else {
        PathBuf::from("./rareindex_data")
    }
}
