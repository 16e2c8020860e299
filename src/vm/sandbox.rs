//! File access toggles for code running in the virtual machine

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// File system seen by the VM.
///
/// Reads and writes are off by default. Clones share their flags, so a
/// handle given to the VM at bootstrap follows toggles made later.
#[derive(Debug, Clone, Default)]
pub struct SandboxFs {
    allow_read: Arc<AtomicBool>,
    allow_write: Arc<AtomicBool>,
}

impl SandboxFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_read(&self) -> bool {
        self.allow_read.load(Ordering::Acquire)
    }

    pub fn set_allow_read(&self, allow: bool) {
        self.allow_read.store(allow, Ordering::Release);
    }

    pub fn allow_write(&self) -> bool {
        self.allow_write.load(Ordering::Acquire)
    }

    pub fn set_allow_write(&self, allow: bool) {
        self.allow_write.store(allow, Ordering::Release);
    }

    /// Open `path` for reading; an empty stream when reads are off
    pub fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        if !self.allow_read() {
            return Ok(Box::new(io::empty()));
        }
        log::trace!("vm opens {} for reading", path.display());
        Ok(Box::new(File::open(path)?))
    }

    /// Open `path` for writing; a sink discarding everything when writes are off
    pub fn open_write(&self, path: &Path, append: bool) -> io::Result<Box<dyn Write + Send>> {
        if !self.allow_write() {
            return Ok(Box::new(io::sink()));
        }
        log::trace!(
            "vm opens {} for {}",
            path.display(),
            if append { "appending" } else { "writing" }
        );
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggles_are_shared_between_clones() {
        let fs = SandboxFs::new();
        let handle = fs.clone();
        assert!(!handle.allow_read());
        assert!(!handle.allow_write());
        fs.set_allow_read(true);
        assert!(handle.allow_read());
        assert!(!handle.allow_write());
    }
}
