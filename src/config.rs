//! Machine tuning knobs (normative defaults).

use serde::{Deserialize, Serialize};

/// Default shadow-copy cadence: one snapshot reference per 128 enqueues.
pub const SHADOW_COPY_INTERVAL: u64 = 128;

/// Replicated tuning parameters.
///
/// Carried inside [`crate::QueueState`] so every replica applies the same
/// cadence and snapshots preserve it across installs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Every N-th enqueue captures a shadow copy and stores it alongside
    /// that enqueue's index entry. Bounds release-cursor granularity;
    /// correctness does not depend on the value. Values below 2 attach a
    /// shadow to every enqueue.
    pub shadow_copy_interval: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            shadow_copy_interval: SHADOW_COPY_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MachineConfig;

    #[test]
    fn defaults_match_normative_values() {
        let config = MachineConfig::default();
        assert_eq!(config.shadow_copy_interval, 128);
    }

    #[test]
    fn serde_default_fills_missing_fields() {
        let config: MachineConfig = serde_json::from_str("{}").expect("empty config");
        assert_eq!(config, MachineConfig::default());
    }
}
