// A single PID-file lock preventing concurrent harvesters from racing on the
// same routing store, in the spirit of `fasteners.InterProcessLock`: a
// non-blocking exclusive create, with the file removed on release.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::HarvestError;

pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Acquire the lock at `path`, failing with
    /// [`HarvestError::AlreadyHarvesting`] if another harvester already
    /// holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref().to_path_buf();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                use std::io::Write as _;
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(HarvestError::AlreadyHarvesting(path.display().to_string()))
            }
            Err(e) => Err(HarvestError::Io(e)),
        }
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_held() {
        let dir = std::env::temp_dir().join(format!("harvester-pidlock-test-{}", std::process::id()));
        let _ = fs::remove_file(&dir);

        let first = PidLock::acquire(&dir).expect("first acquire succeeds");
        let second = PidLock::acquire(&dir);
        assert!(second.is_err());
        drop(first);

        let third = PidLock::acquire(&dir).expect("lock released after drop");
        drop(third);
    }
}
