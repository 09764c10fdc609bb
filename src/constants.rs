//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Sync engine constants
pub mod sync {
    /// Default number of units processed in parallel
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Default retry count for transiently failing units
    pub const DEFAULT_RETRY_COUNT: u32 = 3;

    /// Default delay before a rate-limited unit is retried (seconds)
    pub const DEFAULT_RATE_LIMIT_BACKOFF_SECS: u64 = 30;

    /// Default wall-clock budget for one unit (seconds)
    pub const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 600;

    /// Default timeout for one version-control subprocess (seconds)
    pub const DEFAULT_VCS_TIMEOUT_SECS: u64 = 60;
}

/// Generator response validation constants
pub mod generation {
    /// Minimum accepted length of the micro tier (characters)
    pub const MIN_MICRO_CHARS: usize = 20;

    /// Minimum accepted length of the standard tier (characters)
    pub const MIN_STANDARD_CHARS: usize = 100;

    /// Minimum accepted length of the expansive tier (characters)
    pub const MIN_EXPANSIVE_CHARS: usize = 300;

    /// Minimum accepted length of a module narrative (characters)
    pub const MIN_MODULE_CHARS: usize = 200;

    /// Source text beyond this length is truncated in prompts
    pub const MAX_SOURCE_CHARS: usize = 60_000;

    /// Standard-tier excerpt length used in assignment prompts
    pub const ASSIGNMENT_EXCERPT_CHARS: usize = 1_500;
}

/// Module assignment constants
pub mod assignment {
    /// Recommendations at or above this confidence are applied
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

    /// Smallest file list accepted for a suggested or created module
    pub const DEFAULT_MIN_FILES_PER_MODULE: usize = 2;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}
