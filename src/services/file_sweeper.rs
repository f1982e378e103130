//! Background removal of local files left behind by interrupted uploads.
//!
//! Spool and staging files are normally removed by their guards; a crash or
//! a killed worker can still leave them on disk. The sweeper deletes spool
//! files in the incoming directory and any file in the staging directory
//! once they are older than `max_age`.

use crate::services::upload_service::SPOOL_PREFIX;
use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::{fs, time::interval};
use tracing::{debug, info, warn};

pub struct FileSweeper {
    incoming_dir: PathBuf,
    upload_dir: PathBuf,
    max_age: Duration,
}

impl FileSweeper {
    pub fn new(
        incoming_dir: impl Into<PathBuf>,
        upload_dir: impl Into<PathBuf>,
        max_age: Duration,
    ) -> Self {
        Self {
            incoming_dir: incoming_dir.into(),
            upload_dir: upload_dir.into(),
            max_age,
        }
    }

    /// Sweep every `every`, starting immediately. Runs until the task is
    /// dropped.
    pub async fn run(self, every: Duration) {
        info!(
            "Starting stale file sweeper (interval: {:?}, max age: {:?})",
            every, self.max_age
        );
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let removed = self.sweep().await;
            if removed > 0 {
                info!("removed {} stale upload file(s)", removed);
            }
        }
    }

    /// One pass over both directories; returns how many files were removed.
    pub async fn sweep(&self) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;
        for (dir, spool_only) in [(&self.incoming_dir, true), (&self.upload_dir, false)] {
            match sweep_dir(dir, now, self.max_age, spool_only).await {
                Ok(n) => removed += n,
                Err(err) => warn!("stale file sweep of {} failed: {}", dir.display(), err),
            }
        }
        removed
    }
}

async fn sweep_dir(
    dir: &Path,
    now: SystemTime,
    max_age: Duration,
    spool_only: bool,
) -> io::Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if spool_only && !name.to_string_lossy().starts_with(SPOOL_PREFIX) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(_) => continue,
        };
        // timestamps in the future count as fresh
        let age = now.duration_since(modified).unwrap_or_default();
        if age < max_age {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("removed stale file {} (age {:?})", path.display(), age);
                removed += 1;
            }
            Err(err) => warn!("could not remove stale file {}: {}", path.display(), err),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn write(dir: &TempDir, name: &str, age: Duration) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"leftover").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[tokio::test]
    async fn removes_old_spool_and_staged_files_only() {
        let incoming = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();

        let old_spool = write(&incoming, ".incoming-abc", 2 * DAY);
        let fresh_spool = write(&incoming, ".incoming-def", Duration::from_secs(60));
        let unrelated = write(&incoming, "keep.txt", 2 * DAY);
        let old_staged = write(&uploads, "0c5e-clip.mp4", 2 * DAY);
        let fresh_staged = write(&uploads, "9a1f-clip.mp4", Duration::ZERO);

        let sweeper = FileSweeper::new(incoming.path(), uploads.path(), DAY);
        assert_eq!(sweeper.sweep().await, 2);

        assert!(!old_spool.exists());
        assert!(!old_staged.exists());
        assert!(fresh_spool.exists());
        assert!(fresh_staged.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn missing_directories_are_skipped() {
        let root = TempDir::new().unwrap();
        let sweeper = FileSweeper::new(root.path().join("nope"), root.path().join("gone"), DAY);
        assert_eq!(sweeper.sweep().await, 0);
    }
}
