use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{FileLockRegistry, LogSink, SinkError, SinkSettings};
use crate::domain::{ConfigError, LogEntry, LogLevel};
use crate::format::LINE_ENDING;

/// Appends one formatted line per entry to a file.
///
/// The parent directory is created at construction. Writes run on the
/// blocking pool while holding the path's lock from [`FileLockRegistry`],
/// and a write whose deadline has already passed once the lock is acquired
/// is skipped rather than performed late.
#[derive(Debug)]
pub struct FileSink {
    settings: SinkSettings,
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileSink {
    pub fn new(settings: SinkSettings, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::with_registry(settings, path, &FileLockRegistry::global())
    }

    pub fn with_registry(
        settings: SinkSettings,
        path: impl AsRef<Path>,
        registry: &FileLockRegistry,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "file sink path must not be empty".to_string(),
            ));
        }

        let path = std::path::absolute(path)
            .map(|absolute| normalize(&absolute))
            .map_err(|source| ConfigError::Directory {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory).map_err(|source| ConfigError::Directory {
                path: directory.to_path_buf(),
                source,
            })?;
        }

        let lock = registry.lock_for(&path);
        Ok(Self {
            settings,
            path,
            lock,
        })
    }

    /// Absolute path of the live file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn settings(&self) -> &SinkSettings {
        &self.settings
    }

    /// Appends `line` under the path lock, running `before_write` first while
    /// the lock is held.
    pub(crate) async fn append_with<F>(
        &self,
        line: String,
        deadline: Instant,
        before_write: F,
    ) -> Result<(), SinkError>
    where
        F: FnOnce(&Path) -> std::io::Result<()> + Send + 'static,
    {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        let deadline = deadline.into_std();

        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            if std::time::Instant::now() >= deadline {
                return Err(SinkError::DeadlineExceeded);
            }

            before_write(&path)?;

            let mut payload = line;
            payload.push_str(LINE_ENDING);
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(payload.as_bytes())?;
            Ok(())
        })
        .await
        .map_err(|e| SinkError::Worker(e.to_string()))?
    }
}

/// Resolves `.` and `..` lexically so every spelling of a path shares a lock.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[async_trait]
impl LogSink for FileSink {
    fn name(&self) -> &str {
        self.settings.name()
    }

    fn level(&self) -> LogLevel {
        self.settings.level()
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    async fn write(&self, entry: &LogEntry, deadline: Instant) -> Result<(), SinkError> {
        let line = self.settings.render(entry)?;
        self.append_with(line, deadline, |_| Ok(())).await
    }
}
