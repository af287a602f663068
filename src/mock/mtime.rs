//! Failing modification-time writer

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::retry::MtimeWriter;

/// Rejects every timestamp update and counts the attempts
#[derive(Debug, Default)]
pub struct FailingMtime {
    attempts: AtomicUsize,
}

impl FailingMtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MtimeWriter for FailingMtime {
    fn set_modified(&self, path: &Path, _time: SystemTime) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("injected mtime failure for {}", path.display()),
        ))
    }
}
