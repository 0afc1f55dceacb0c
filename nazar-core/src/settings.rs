//! Scan and container settings.

use serde::Deserialize;

/// Limits and switches shared by the scanner and the container.
///
/// Deserializable so hosts can load it from their own configuration;
/// missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Upper bound on operations processed by one bean's deferred queue.
    pub max_deferred_operations: usize,
    /// Whether a service registration may replace an existing one.
    pub allow_override: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_deferred_operations: 10_000,
            allow_override: false,
        }
    }
}
