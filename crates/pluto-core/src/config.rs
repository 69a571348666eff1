//! Context configuration.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default maximum cascade depth when removing entities.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 100;

/// Default number of lazy resolutions on one relationship before the
/// N+1 warning is logged.
pub const DEFAULT_N_PLUS_ONE_THRESHOLD: usize = 10;

/// Configuration for a [`Context`](crate::Context).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Resolve unloaded navigations transparently on first access.
    pub lazy_loading: bool,

    /// Maximum recursion depth when cascading removals.
    pub max_cascade_depth: usize,

    /// Lazy resolutions of the same relationship after which a warning is
    /// logged. Zero disables the warning.
    pub n_plus_one_threshold: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            lazy_loading: true,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            n_plus_one_threshold: DEFAULT_N_PLUS_ONE_THRESHOLD,
        }
    }
}

impl ContextConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Enable or disable lazy loading.
    pub fn with_lazy_loading(mut self, enabled: bool) -> Self {
        self.lazy_loading = enabled;
        self
    }

    /// Disable lazy loading.
    pub fn without_lazy_loading(self) -> Self {
        self.with_lazy_loading(false)
    }

    /// Set the maximum cascade depth.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Set the N+1 warning threshold.
    pub fn with_n_plus_one_threshold(mut self, threshold: usize) -> Self {
        self.n_plus_one_threshold = threshold;
        self
    }
}
