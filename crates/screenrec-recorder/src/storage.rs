//! Output directories and file naming.
//!
//! ```text
//! <root>/
//! ├── screenshots/
//! │   └── screenshot_2026-10-16 14h-03m-27s.png
//! └── videos/
//!     └── recording_2026-10-16 14h-05m-10s.mkv
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, warn};

/// Timestamp format used in every output file name.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %Hh-%Mm-%Ss";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Screenshots,
    Videos,
}

impl OutputKind {
    pub const ALL: [OutputKind; 2] = [OutputKind::Screenshots, OutputKind::Videos];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Screenshots => "screenshots",
            Self::Videos      => "videos",
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            Self::Screenshots => "screenshot",
            Self::Videos      => "recording",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Screenshots => "png",
            Self::Videos      => "mkv",
        }
    }
}

pub fn output_dir(root: &Path, kind: OutputKind) -> PathBuf {
    root.join(kind.dir_name())
}

/// Create `<root>/<kind>` if missing. Safe to call repeatedly.
pub fn ensure_output_directory(root: &Path, kind: OutputKind) -> io::Result<PathBuf> {
    let dir = output_dir(root, kind);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `<root>/<kind>/<prefix>_<timestamp>.<ext>` for the given instant.
pub fn timestamped_path<Tz>(root: &Path, kind: OutputKind, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format(TIMESTAMP_FORMAT);
    output_dir(root, kind).join(format!("{}_{}.{}", kind.file_prefix(), stamp, kind.extension()))
}

/// Output path for a new file of `kind`, stamped with the local time.
pub fn new_output_path(root: &Path, kind: OutputKind) -> PathBuf {
    timestamped_path(root, kind, &Local::now())
}

// ── Cleaning ──────────────────────────────────────────────────────────────────

/// What a directory clean-up found or did.
#[derive(Debug, PartialEq, Eq)]
pub enum CleanOutcome {
    Missing,
    AlreadyEmpty,
    Removed { removed: usize, failed: Vec<(PathBuf, String)> },
}

/// Regular files directly inside `<root>/<kind>`, or `None` if the folder
/// does not exist.
pub fn list_outputs(root: &Path, kind: OutputKind) -> io::Result<Option<Vec<PathBuf>>> {
    let dir = output_dir(root, kind);
    if !dir.exists() {
        return Ok(None);
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(Some(files))
}

/// Delete every regular file in `<root>/<kind>`. Failures are collected,
/// not fatal.
pub fn clean_directory(root: &Path, kind: OutputKind) -> io::Result<CleanOutcome> {
    let Some(files) = list_outputs(root, kind)? else {
        return Ok(CleanOutcome::Missing);
    };
    if files.is_empty() {
        return Ok(CleanOutcome::AlreadyEmpty);
    }

    let mut removed = 0;
    let mut failed = Vec::new();
    for file in files {
        match std::fs::remove_file(&file) {
            Ok(()) => {
                debug!("Deleted {}", file.display());
                removed += 1;
            }
            Err(e) => {
                warn!("Error deleting {}: {}", file.display(), e);
                failed.push((file, e.to_string()));
            }
        }
    }
    Ok(CleanOutcome::Removed { removed, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn ensure_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let first = ensure_output_directory(root.path(), OutputKind::Videos).unwrap();
        let second = ensure_output_directory(root.path(), OutputKind::Videos).unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert!(first.ends_with("videos"));
    }

    #[test]
    fn paths_use_readable_timestamps() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
            .and_utc();
        let root = Path::new("/data");

        assert_eq!(
            timestamped_path(root, OutputKind::Videos, &at),
            PathBuf::from("/data/videos/recording_2026-10-16 09h-05m-07s.mkv")
        );
        assert_eq!(
            timestamped_path(root, OutputKind::Screenshots, &at),
            PathBuf::from("/data/screenshots/screenshot_2026-10-16 09h-05m-07s.png")
        );
    }

    #[test]
    fn clean_reports_missing_and_empty() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(clean_directory(root.path(), OutputKind::Screenshots).unwrap(), CleanOutcome::Missing);

        ensure_output_directory(root.path(), OutputKind::Screenshots).unwrap();
        assert_eq!(
            clean_directory(root.path(), OutputKind::Screenshots).unwrap(),
            CleanOutcome::AlreadyEmpty
        );
    }

    #[test]
    fn clean_removes_files_only() {
        let root = tempfile::tempdir().unwrap();
        let dir = ensure_output_directory(root.path(), OutputKind::Videos).unwrap();
        std::fs::write(dir.join("a.mkv"), b"x").unwrap();
        std::fs::write(dir.join("b.mkv"), b"y").unwrap();
        std::fs::create_dir(dir.join("nested")).unwrap();

        let outcome = clean_directory(root.path(), OutputKind::Videos).unwrap();

        assert_eq!(outcome, CleanOutcome::Removed { removed: 2, failed: Vec::new() });
        assert!(dir.join("nested").is_dir());
        assert_eq!(list_outputs(root.path(), OutputKind::Videos).unwrap(), Some(Vec::new()));
    }
}
