//! Enumerated configuration options (spec §6), loaded from TOML by `airlock-node`
//! with these values as defaults.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub guardian_count: u8,
    pub approval_threshold: u8,
    pub flag_threshold: f64,
    pub vdf_iterations: u64,
    pub proposal_deadline_seconds: u64,
    pub scorer_timeout_ms: u64,
    pub checkpoint_every: u64,
}

impl Config {
    /// `rejection_threshold = guardian_count - approval_threshold + 1`: the smallest
    /// reject count that makes an approval mathematically impossible.
    pub fn rejection_threshold(&self) -> u8 {
        self.guardian_count - self.approval_threshold + 1
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            guardian_count: 10,
            approval_threshold: 7,
            flag_threshold: 50.0,
            vdf_iterations: 300_000_000,
            proposal_deadline_seconds: 300,
            scorer_timeout_ms: 10_000,
            checkpoint_every: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_sum_to_n_plus_one() {
        let cfg = Config::default();
        assert_eq!(
            cfg.approval_threshold as u16 + cfg.rejection_threshold() as u16,
            cfg.guardian_count as u16 + 1
        );
    }

    #[test]
    fn rejection_threshold_is_four_by_default() {
        assert_eq!(Config::default().rejection_threshold(), 4);
    }
}
