//! Install-folder lock (A5, §4.16): a cross-process exclusive lock on
//! `<installFolder>/.install.lock`, held for the daemon's lifetime so two
//! `corrald listen` processes never manage the same install folder at once.
//!
//! Grounded on the pattern of opening the lock file with `create(true)` and
//! `truncate(false)` *before* attempting the lock: a process that loses the race
//! must not wipe out whatever the winner has already written there.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use corral_core::prelude::*;
use fs2::FileExt;

const LOCK_FILE_NAME: &str = ".install.lock";

/// How often `acquire_with_timeout` retries while waiting for another process to
/// release the lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Held for as long as this process owns the install folder; releases the lock on
/// drop.
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    /// Attempts to acquire the exclusive lock immediately, failing rather than
    /// blocking if another process already holds it (§4.16: "fails fast when
    /// already held").
    pub fn acquire(install_folder: &Path) -> Result<Self> {
        Self::acquire_with_timeout(install_folder, Duration::ZERO)
    }

    /// Acquires the lock, retrying at `RETRY_INTERVAL` until `timeout` elapses
    /// (§6: "acquire the lock for the duration of an install run with a caller-
    /// supplied timeout"). `timeout == Duration::ZERO` tries exactly once.
    pub fn acquire_with_timeout(install_folder: &Path, timeout: Duration) -> Result<Self> {
        std::fs::create_dir_all(install_folder)
            .map_err(|e| Error::configuration(vec![format!("cannot create install folder: {e}")]))?;

        let path = install_folder.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::configuration(vec![format!("cannot open {}: {e}", path.display())]))?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(RETRY_INTERVAL.min(timeout));
                }
                Err(_) => {
                    return Err(Error::configuration(vec![format!(
                        "install folder {} is already locked by another corrald process",
                        install_folder.display()
                    )]))
                }
            }
        }

        write_marker(&file);
        info!("acquired install lock at {}", path.display());

        Ok(Self { file, path })
    }
}

fn write_marker(file: &File) {
    use std::io::Write as _;
    let mut f = file;
    let _ = writeln!(f, "{}", std::process::id());
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to release install lock at {}: {e}", self.path.display());
        } else {
            debug!("released install lock at {}", self.path.display());
        }
    }
}
