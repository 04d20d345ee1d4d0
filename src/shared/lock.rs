use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

// Exclusive OS file lock held for as long as a process drives a serial port.
// Two trackers talking to one modem interleave AT exchanges, so the second
// one must fail fast instead.
pub struct PortLock {
    file: File,
    path: PathBuf,
}

impl PortLock {
    // Lock `<lock_dir>/<port file name>.lock`, e.g. `/run/tracker/ttyUSB2.lock`.
    pub fn acquire(lock_dir: &Path, port: &str) -> Result<Self> {
        if !lock_dir.as_os_str().is_empty() {
            fs::create_dir_all(lock_dir).with_context(|| {
                format!("creating lock directory failed: {}", lock_dir.display())
            })?;
        }

        let path = lock_dir.join(lock_file_name(port));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file failed: {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!("{} is already driven by another process ({})", port, path.display())
        })?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_file_name(port: &str) -> String {
    let base = Path::new(port)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(port);
    let sanitized: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{sanitized}.lock")
}
