//! Reasoning effort selection
//!
//! Providers that support extended reasoning receive an `Effort` per request.
//! The policy is injected into the generator so callers can tune cost
//! without touching prompt code.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Kind of generator request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTask {
    Tiers,
    Update,
    Module,
    Assignment,
}

pub trait EffortPolicy: Send + Sync {
    fn effort_for(&self, task: GenerationTask, source_len: usize) -> Effort;
}

/// Scales effort with input size; module narratives start one step higher
#[derive(Debug, Clone)]
pub struct SizeBasedEffort {
    /// Inputs at or below this many characters get `Low`
    pub small: usize,
    /// Inputs above this many characters get `High`
    pub large: usize,
}

impl Default for SizeBasedEffort {
    fn default() -> Self {
        Self {
            small: 4_000,
            large: 24_000,
        }
    }
}

impl EffortPolicy for SizeBasedEffort {
    fn effort_for(&self, task: GenerationTask, source_len: usize) -> Effort {
        let by_size = if source_len <= self.small {
            Effort::Low
        } else if source_len <= self.large {
            Effort::Medium
        } else {
            Effort::High
        };
        match task {
            GenerationTask::Module => by_size.max(Effort::Medium),
            GenerationTask::Assignment => Effort::Medium,
            GenerationTask::Tiers | GenerationTask::Update => by_size,
        }
    }
}

/// Same effort for every request
#[derive(Debug, Clone, Copy)]
pub struct FixedEffort(pub Effort);

impl EffortPolicy for FixedEffort {
    fn effort_for(&self, _task: GenerationTask, _source_len: usize) -> Effort {
        self.0
    }
}
