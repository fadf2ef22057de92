use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Absolute root under which finished recordings are stored.
    pub save_directory: String,
    /// Absolute directory for in-progress recordings.
    pub temp_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub margins: MarginConfig,
    /// Fixed UTC offset used for template date tokens and time-free chunk stamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub transcode: TranscodeSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Database location: the configured path or `~/.radiorec/data/radiorec.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

fn default_timezone() -> String {
    "+09:00".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_directory_template")]
    pub directory: String,
    #[serde(default = "default_filename_template")]
    pub filename: String,
}

fn default_directory_template() -> String {
    "$StationId$".to_string()
}

fn default_filename_template() -> String {
    "$SYYYY$$SMM$$SDD$$STHH$$STMM$_$Title$".to_string()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: default_directory_template(),
            filename: default_filename_template(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginConfig {
    #[serde(default)]
    pub start_seconds: u64,
    #[serde(default)]
    pub end_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Added to the expected runtime of every process invocation.
    #[serde(default = "default_timeout_grace")]
    pub timeout_grace_seconds: u64,
    /// Length of one time-free chunk request.
    #[serde(default = "default_chunk_seconds")]
    pub chunk_seconds: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_file_extension() -> String {
    "m4a".to_string()
}

fn default_timeout_grace() -> u64 {
    120
}

fn default_chunk_seconds() -> u64 {
    300
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            file_extension: default_file_extension(),
            timeout_grace_seconds: default_timeout_grace(),
            chunk_seconds: default_chunk_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
