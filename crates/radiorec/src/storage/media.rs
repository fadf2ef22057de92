use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use tokio::fs;

use crate::config::{Config, PathTemplateEngine};
use crate::error::{ConfigError, StorageError};
use crate::recording::ProgramInfo;
use crate::sanitize::redact_path;

/// How many `_duplicate_` names are tried before giving up.
const MAX_PLACEMENT_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub save_directory: PathBuf,
    pub temp_directory: PathBuf,
}

impl StorageConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            save_directory: PathBuf::from(&config.save_directory),
            temp_directory: PathBuf::from(&config.temp_directory),
        }
    }
}

/// Where a recording is written while in progress and where it ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPath {
    pub temp_file_path: PathBuf,
    /// Absolute final location under the save directory.
    pub final_file_path: PathBuf,
    /// `final_file_path` relative to the save directory.
    pub relative_path: PathBuf,
}

impl MediaPath {
    /// The relative path with `/` separators, as persisted.
    pub fn relative_path_string(&self) -> String {
        self.relative_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Scratch directory for time-free chunks, next to the temp file.
    pub fn chunk_directory(&self) -> PathBuf {
        let stem = self
            .temp_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());
        self.temp_file_path
            .with_file_name(format!("{}_chunks", stem))
    }
}

pub struct MediaStorage {
    config: StorageConfig,
    templates: PathTemplateEngine,
}

impl MediaStorage {
    pub fn new(config: StorageConfig, templates: PathTemplateEngine) -> Self {
        Self { config, templates }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            StorageConfig::from_config(config),
            PathTemplateEngine::from_config(config)?,
        ))
    }

    /// Plans the final location of `program` and allocates a fresh temp file
    /// path. Every call yields a distinct temp path.
    pub async fn prepare(&self, program: &ProgramInfo) -> Result<MediaPath, StorageError> {
        let save_root = &self.config.save_directory;
        if !save_root.is_absolute() {
            return Err(StorageError::InvalidSaveDirectory {
                path: save_root.clone(),
                reason: "must be an absolute path".to_string(),
            });
        }
        fs::create_dir_all(save_root)
            .await
            .map_err(|e| StorageError::InvalidSaveDirectory {
                path: save_root.clone(),
                reason: e.to_string(),
            })?;

        let temp_root = &self.config.temp_directory;
        fs::create_dir_all(temp_root)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: temp_root.clone(),
                source: e,
            })?;

        let relative_path = self.templates.resolve(program);
        let final_file_path = save_root.join(&relative_path);
        let temp_name = format!(
            "{}_{}.{}",
            temp_name_prefix(&program.program_id),
            uuid::Uuid::new_v4().simple(),
            self.templates.extension()
        );
        let temp_file_path = temp_root.join(temp_name);

        debug!(
            "Prepared media path {} (temp {})",
            relative_path.display(),
            redact_path(&temp_file_path)
        );

        Ok(MediaPath {
            temp_file_path,
            final_file_path,
            relative_path,
        })
    }

    /// Moves the temp file to its final location without ever replacing an
    /// existing file. On a name collision the new file is stored as
    /// `{stem}_duplicate_{suffix}{ext}` and the returned path says so.
    pub async fn commit(&self, path: &MediaPath) -> Result<MediaPath, StorageError> {
        if !fs::try_exists(&path.temp_file_path).await.unwrap_or(false) {
            return Err(StorageError::MissingTempFile(path.temp_file_path.clone()));
        }

        if let Some(parent) = path.final_file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let placed = place_without_clobber(&path.temp_file_path, &path.final_file_path).await?;

        let mut committed = path.clone();
        if placed != path.final_file_path {
            info!(
                "{} already exists, stored recording as {}",
                redact_path(&path.final_file_path),
                redact_path(&placed)
            );
            if let Some(name) = placed.file_name() {
                committed.relative_path.set_file_name(name);
            }
            committed.final_file_path = placed;
        }

        Ok(committed)
    }

    /// Removes the temp file and any chunk scratch directory. Never fails.
    pub async fn cleanup_temp(&self, path: &MediaPath) {
        match fs::remove_file(&path.temp_file_path).await {
            Ok(()) => debug!("Removed temp file {}", redact_path(&path.temp_file_path)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temp file {}: {}",
                redact_path(&path.temp_file_path),
                e
            ),
        }

        let chunks = path.chunk_directory();
        match fs::remove_dir_all(&chunks).await {
            Ok(()) => debug!("Removed chunk directory {}", redact_path(&chunks)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove chunk directory {}: {}",
                redact_path(&chunks),
                e
            ),
        }
    }
}

/// Places `src` at `dst` or, if taken, at the first free duplicate name.
/// A hard link gives an atomic create-if-absent; when linking is not
/// possible (cross-device, unsupported filesystem) the bytes are copied into
/// an exclusively created file instead.
async fn place_without_clobber(src: &Path, dst: &Path) -> Result<PathBuf, StorageError> {
    let move_error = |to: &Path, e: std::io::Error| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    };

    for attempt in 0..MAX_PLACEMENT_ATTEMPTS {
        let candidate = if attempt == 0 {
            dst.to_path_buf()
        } else {
            duplicate_name(dst)
        };

        match fs::hard_link(src, &candidate).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                debug!("Hard link failed ({}), copying instead", e);
                match copy_exclusive(src, &candidate).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                    Err(e) => return Err(move_error(&candidate, e)),
                }
            }
        }

        // The recording is already at `candidate`; a leftover source is
        // only a stray temp file for cleanup_temp to retry.
        if let Err(e) = fs::remove_file(src).await {
            warn!(
                "Stored {} but could not remove temp file {}: {}",
                redact_path(&candidate),
                redact_path(src),
                e
            );
        }
        return Ok(candidate);
    }

    Err(StorageError::FileExists(dst.to_path_buf()))
}

async fn copy_exclusive(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut source = fs::File::open(src).await?;
    let mut target = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .await?;

    let copied = tokio::io::copy(&mut source, &mut target).await;
    if let Err(e) = copied {
        drop(target);
        let _ = fs::remove_file(dst).await;
        return Err(e);
    }
    target.sync_all().await
}

fn duplicate_name(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    path.with_file_name(format!("{}_duplicate_{}{}", stem, &suffix[..8], ext))
}

fn temp_name_prefix(program_id: &str) -> String {
    let prefix: String = program_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if prefix.is_empty() {
        "recording".to_string()
    } else {
        prefix
    }
}
