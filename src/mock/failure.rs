//! Failure injection for the mock toolkit

use std::path::Path;
use std::time::Duration;

use super::ToolOp;

/// What happens when an injected operation matches
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error message to return (if any)
    pub error_message: Option<String>,
    /// Delay to add before running
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
    /// Only calls whose input filename contains this string match
    pub file_pattern: Option<String>,
}

impl FailureConfig {
    /// Create a config that returns an error
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            delay: None,
            fail_count: None,
            file_pattern: None,
        }
    }

    /// Create a config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            error_message: None,
            delay: Some(duration),
            fail_count: None,
            file_pattern: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// Restrict to inputs whose filename contains `pattern`
    pub fn for_file(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = Some(pattern.into());
        self
    }

    fn applies_to(&self, input: &Path) -> bool {
        match &self.file_pattern {
            None => true,
            Some(pattern) => input
                .file_name()
                .map(|n| n.to_string_lossy().contains(pattern.as_str()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug)]
struct Injection {
    op: ToolOp,
    config: FailureConfig,
    calls: u32,
}

/// Failure injector for the mock toolkit
#[derive(Debug, Default)]
pub struct FailureInjector {
    injections: Vec<Injection>,
}

impl FailureInjector {
    /// Create a new failure injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation
    pub fn inject(&mut self, op: ToolOp, config: FailureConfig) {
        self.injections.push(Injection {
            op,
            config,
            calls: 0,
        });
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.injections.clear();
    }

    /// Clear failure injection for a specific operation
    pub fn clear_op(&mut self, op: ToolOp) {
        self.injections.retain(|i| i.op != op);
    }

    /// Check whether a call should be delayed or fail.
    ///
    /// Returns the first matching config still within its fail count.
    pub fn check(&mut self, op: ToolOp, input: &Path) -> Option<FailureConfig> {
        for injection in self
            .injections
            .iter_mut()
            .filter(|i| i.op == op && i.config.applies_to(input))
        {
            injection.calls += 1;
            if let Some(limit) = injection.config.fail_count {
                if injection.calls > limit {
                    continue;
                }
            }
            return Some(injection.config.clone());
        }
        None
    }
}
