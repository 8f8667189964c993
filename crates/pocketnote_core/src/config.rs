//! Core runtime configuration.
//!
//! # Invariants
//! - `data_root` is absolute.
//! - The media root defaults to `data_root`, giving the
//!   `<root>/<userId>/{images,audios}` layout.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_FILE_NAME: &str = "pocketnote.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyDataRoot,
    RelativeDataRoot(PathBuf),
    InvalidDbFileName(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDataRoot => write!(f, "data_root cannot be empty"),
            Self::RelativeDataRoot(path) => {
                write!(f, "data_root must be an absolute path, got `{}`", path.display())
            }
            Self::InvalidDbFileName(name) => {
                write!(f, "db_file_name must be a plain file name, got `{name}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Paths and levels used to assemble the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    data_root: PathBuf,
    db_file_name: String,
    media_root: Option<PathBuf>,
    log_level: &'static str,
}

impl CoreConfig {
    /// Builds a config rooted at an absolute app-private directory.
    pub fn new(data_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = data_root.as_ref();
        if raw.as_os_str().is_empty() || raw.to_string_lossy().trim().is_empty() {
            return Err(ConfigError::EmptyDataRoot);
        }
        if !raw.is_absolute() {
            return Err(ConfigError::RelativeDataRoot(raw.to_path_buf()));
        }
        Ok(Self {
            data_root: raw.to_path_buf(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            media_root: None,
            log_level: default_log_level(),
        })
    }

    pub fn with_db_file_name(mut self, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let trimmed = name.trim();
        let is_plain = !trimmed.is_empty()
            && Path::new(trimmed).file_name().and_then(|n| n.to_str()) == Some(trimmed);
        if !is_plain {
            return Err(ConfigError::InvalidDbFileName(name));
        }
        self.db_file_name = trimmed.to_string();
        Ok(self)
    }

    pub fn with_media_root(mut self, media_root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(media_root.into());
        self
    }

    pub fn with_log_level(mut self, level: &'static str) -> Self {
        self.log_level = level;
        self
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_root.join(&self.db_file_name)
    }

    pub fn media_root(&self) -> &Path {
        self.media_root.as_deref().unwrap_or(&self.data_root)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_root.join("logs")
    }

    pub fn log_level(&self) -> &'static str {
        self.log_level
    }
}
