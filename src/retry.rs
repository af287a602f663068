//! Bounded retry for flaky filesystem metadata writes
//!
//! Setting a modification time can fail spuriously on some filesystems.
//! Those failures only cost cache efficiency, so after the last attempt the
//! caller logs a warning instead of failing.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

/// Delay source, injectable so tests never really sleep
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Attempt count and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. The last error is returned.
pub fn retry_bounded<T, E, F>(policy: RetryPolicy, sleeper: &dyn Sleeper, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(_) => {
                sleeper.sleep(policy.delay);
                attempt += 1;
            }
        }
    }
}

/// Writes file modification times
pub trait MtimeWriter: Send + Sync {
    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;
}

/// Writes through the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMtime;

impl MtimeWriter for FileMtime {
    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        File::options().write(true).open(path)?.set_modified(time)
    }
}

/// Sets modification times with bounded retries.
///
/// Exhaustion is logged, never raised.
#[derive(Clone)]
pub struct Toucher {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    writer: Arc<dyn MtimeWriter>,
}

impl Default for Toucher {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            writer: Arc::new(FileMtime),
        }
    }
}

impl Toucher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn MtimeWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Set `path`'s modification time to now
    pub fn touch(&self, path: &Path) -> bool {
        self.touch_at(path, SystemTime::now())
    }

    /// Set `path`'s modification time, returning whether it was set
    pub fn touch_at(&self, path: &Path, time: SystemTime) -> bool {
        let result = retry_bounded(self.policy, self.sleeper.as_ref(), |_| {
            self.writer.set_modified(path, time)
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    attempts = self.policy.max_attempts,
                    error = %e,
                    "could not update modification time; file may be reprocessed next run"
                );
                false
            }
        }
    }
}
