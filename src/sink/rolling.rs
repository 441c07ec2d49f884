// Size/time based rollover for file sinks.
//
// Before every write, while holding the file's lock, the live file is
// checked against the policy. When a trigger fires it is renamed to
// `{stem}.{N}{ext}` with N one above the highest existing archive, and the
// lowest-numbered archives are deleted until at most `max_archive_count`
// remain. The next append recreates the live file.

use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{FileLockRegistry, FileSink, LogSink, SinkError, SinkSettings};
use crate::domain::{ConfigError, LogEntry, LogLevel};

pub const DEFAULT_MAX_FILE_SIZE_KILOBYTES: i64 = 1024;
pub const DEFAULT_MAX_ARCHIVE_COUNT: usize = 10;
pub const MAX_FILE_SIZE_KILOBYTES: i64 = i32::MAX as i64 / 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloverPeriod {
    #[default]
    Never,
    Daily,
    Hourly,
}

impl RolloverPeriod {
    /// Whether a file created at `created` belongs to an earlier period than `now`.
    pub fn has_elapsed(self, created: DateTime<Local>, now: DateTime<Local>) -> bool {
        match self {
            RolloverPeriod::Never => false,
            RolloverPeriod::Daily => created.date_naive() != now.date_naive(),
            RolloverPeriod::Hourly => {
                created.date_naive() != now.date_naive() || created.hour() != now.hour()
            }
        }
    }
}

impl FromStr for RolloverPeriod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(RolloverPeriod::Never),
            "daily" => Ok(RolloverPeriod::Daily),
            "hourly" => Ok(RolloverPeriod::Hourly),
            _ => Err(ConfigError::InvalidConfig(format!(
                "Unknown rollover period '{s}' (expected never, daily or hourly)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollPolicy {
    pub max_file_size_bytes: u64,
    pub max_archive_count: usize,
    pub rollover_period: RolloverPeriod,
}

impl RollPolicy {
    pub fn new(
        max_file_size_kilobytes: i64,
        max_archive_count: usize,
        rollover_period: RolloverPeriod,
    ) -> Result<Self, ConfigError> {
        if !(0..=MAX_FILE_SIZE_KILOBYTES).contains(&max_file_size_kilobytes) {
            return Err(ConfigError::OutOfRange {
                field: "max_file_size_kilobytes",
                value: max_file_size_kilobytes,
                min: 0,
                max: MAX_FILE_SIZE_KILOBYTES,
            });
        }

        Ok(Self {
            max_file_size_bytes: max_file_size_kilobytes as u64 * 1024,
            max_archive_count,
            rollover_period,
        })
    }

    /// Whether the live file described by `metadata` must be archived now.
    /// Empty files never roll.
    pub fn should_roll(&self, metadata: &Metadata, now: DateTime<Local>) -> bool {
        if metadata.len() == 0 {
            return false;
        }
        if metadata.len() > self.max_file_size_bytes {
            return true;
        }
        creation_time(metadata)
            .is_some_and(|created| self.rollover_period.has_elapsed(created, now))
    }
}

impl Default for RollPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_KILOBYTES as u64 * 1024,
            max_archive_count: DEFAULT_MAX_ARCHIVE_COUNT,
            rollover_period: RolloverPeriod::Never,
        }
    }
}

// Birth time is not available everywhere and is not carried over by copies,
// so the earlier of birth and modification time is used.
fn creation_time(metadata: &Metadata) -> Option<DateTime<Local>> {
    let modified = metadata.modified().ok();
    let created = metadata.created().ok();
    let earliest = match (created, modified) {
        (Some(created), Some(modified)) => Some(created.min(modified)),
        (created, modified) => created.or(modified),
    };
    earliest.map(DateTime::<Local>::from)
}

/// Naming scheme of the archives belonging to one live file.
#[derive(Debug)]
struct ArchiveLayout {
    directory: PathBuf,
    stem: String,
    extension: String,
    pattern: Regex,
}

impl ArchiveLayout {
    fn for_path(path: &Path) -> Result<Self, ConfigError> {
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ConfigError::InvalidConfig(format!("{} has no file name", path.display()))
            })?;
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let pattern = Regex::new(&format!(
            r"^{}\.(\d+){}$",
            regex::escape(&stem),
            regex::escape(&extension)
        ))
        .map_err(|e| ConfigError::InvalidConfig(format!("archive pattern: {e}")))?;

        Ok(Self {
            directory,
            stem,
            extension,
            pattern,
        })
    }

    fn archive_path(&self, number: u64) -> PathBuf {
        self.directory
            .join(format!("{}.{number}{}", self.stem, self.extension))
    }

    fn archive_number(&self, file_name: &str) -> Option<u64> {
        self.pattern
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|number| number.as_str().parse().ok())
    }

    /// Existing archives ordered by number, lowest first.
    fn list(&self) -> io::Result<Vec<(u64, PathBuf)>> {
        let mut archives = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(number) = file_name.to_str().and_then(|name| self.archive_number(name)) else {
                continue;
            };
            archives.push((number, entry.path()));
        }
        archives.sort_by_key(|(number, _)| *number);
        Ok(archives)
    }
}

/// Rollover state for one live file. Must only be used under that file's lock.
#[derive(Debug)]
struct Rollover {
    policy: RollPolicy,
    layout: ArchiveLayout,
}

impl Rollover {
    fn roll_if_needed(&self, live: &Path) -> io::Result<Option<PathBuf>> {
        let metadata = match fs::metadata(live) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        if !self.policy.should_roll(&metadata, Local::now()) {
            return Ok(None);
        }

        let archives = self.layout.list()?;
        let next = archives.last().map_or(1, |(number, _)| number + 1);
        let archive = self.layout.archive_path(next);
        fs::rename(live, &archive)?;
        info!(
            file = %live.display(),
            archive = %archive.display(),
            size = metadata.len(),
            "rolled log file"
        );

        self.prune()?;
        Ok(Some(archive))
    }

    fn prune(&self) -> io::Result<()> {
        let archives = self.layout.list()?;
        let excess = archives.len().saturating_sub(self.policy.max_archive_count);

        for (_, path) in archives.iter().take(excess) {
            match fs::remove_file(path) {
                Ok(()) => info!(archive = %path.display(), "pruned log archive"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(archive = %path.display(), error = %e, "failed to prune log archive");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// A [`FileSink`] that archives and prunes its file according to a [`RollPolicy`].
#[derive(Debug)]
pub struct RollingFileSink {
    file: FileSink,
    rollover: Arc<Rollover>,
}

impl RollingFileSink {
    pub fn new(
        settings: SinkSettings,
        path: impl AsRef<Path>,
        policy: RollPolicy,
    ) -> Result<Self, ConfigError> {
        Self::with_registry(settings, path, policy, &FileLockRegistry::global())
    }

    pub fn with_registry(
        settings: SinkSettings,
        path: impl AsRef<Path>,
        policy: RollPolicy,
        registry: &FileLockRegistry,
    ) -> Result<Self, ConfigError> {
        let file = FileSink::with_registry(settings, path, registry)?;
        let layout = ArchiveLayout::for_path(file.path())?;

        Ok(Self {
            file,
            rollover: Arc::new(Rollover { policy, layout }),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn policy(&self) -> &RollPolicy {
        &self.rollover.policy
    }

    /// Path an archive with the given number would have.
    pub fn archive_path(&self, number: u64) -> PathBuf {
        self.rollover.layout.archive_path(number)
    }
}

#[async_trait]
impl LogSink for RollingFileSink {
    fn name(&self) -> &str {
        self.file.name()
    }

    fn level(&self) -> LogLevel {
        self.file.level()
    }

    fn timeout(&self) -> Duration {
        self.file.timeout()
    }

    async fn write(&self, entry: &LogEntry, deadline: Instant) -> Result<(), SinkError> {
        let line = self.file.settings().render(entry)?;
        let rollover = Arc::clone(&self.rollover);
        self.file
            .append_with(line, deadline, move |live| {
                rollover.roll_if_needed(live).map(|_| ())
            })
            .await
    }
}
