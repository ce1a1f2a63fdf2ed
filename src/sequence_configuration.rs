//! Configuration types for RSequence operations

use serde::{Deserialize, Serialize};

/// What to do when a terminal operation is started while another one runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationPolicy {
    /// Log at error level and return `SequenceError::ConcurrencyViolation`
    Error,
    /// Log at error level, then panic
    Panic,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        ViolationPolicy::Error
    }
}

/// Configuration for a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Name used to prefix log lines and errors
    pub label: String,
    /// Reject `seek` on a view without a predicate instead of warning
    pub strict_seek: bool,
    /// Reaction to overlapping terminal operations
    pub violation_policy: ViolationPolicy,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            label: "sequence".to_string(),
            strict_seek: false,
            violation_policy: ViolationPolicy::Error,
        }
    }
}

impl SequenceConfig {
    /// Create a new sequence configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label used in logs and errors
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Make predicate-less `seek` an error instead of a warning
    pub fn strict_seek(mut self, strict: bool) -> Self {
        self.strict_seek = strict;
        self
    }

    /// Set the violation policy
    pub fn violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation_policy = policy;
        self
    }
}
