//! Shared configuration helpers and the strategy selector config.
//!
//! Component configs live next to their components ([`RateLimitConfig`]
//! (crate::limiter::RateLimitConfig), [`CacheConfig`](crate::cache::CacheConfig),
//! [`BreakerConfig`](crate::breaker::BreakerConfig), [`RetryConfig`]
//! (crate::retry::RetryConfig)); this module holds what they share.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::AbGroup;

/// Serialize/deserialize a `Duration` as whole seconds, so host
/// applications can embed skald configs in their own config files.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serialize/deserialize a `Duration` as whole milliseconds, for the
/// sub-second retry delays.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Configuration for the template/live strategy selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Probability of choosing the template path for the control group.
    /// Default: 0.9.
    pub control_template_ratio: f64,
    /// Probability of choosing the template path for the hybrid group.
    /// Default: 0.5.
    pub hybrid_template_ratio: f64,
    /// Probability of choosing the template path for the live group.
    /// Default: 0.1.
    pub live_template_ratio: f64,
    /// How many recent history turns go into the assembled prompt.
    /// Default: 6.
    pub history_turns: usize,
    /// Mandatory deadline on every external call. Default: 30s.
    #[serde(with = "duration_secs")]
    pub invoke_timeout: Duration,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            control_template_ratio: 0.9,
            hybrid_template_ratio: 0.5,
            live_template_ratio: 0.1,
            history_turns: 6,
            invoke_timeout: Duration::from_secs(30),
        }
    }
}

impl StrategyConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template ratio for one A/B group.
    pub fn template_ratio(mut self, group: AbGroup, ratio: f64) -> Self {
        match group {
            AbGroup::Control => self.control_template_ratio = ratio,
            AbGroup::Hybrid => self.hybrid_template_ratio = ratio,
            AbGroup::Live => self.live_template_ratio = ratio,
        }
        self
    }

    /// Set how many history turns are included in prompts.
    pub fn history_turns(mut self, n: usize) -> Self {
        self.history_turns = n;
        self
    }

    /// Set the external call deadline.
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Template-path probability for a group.
    pub fn ratio_for(&self, group: AbGroup) -> f64 {
        match group {
            AbGroup::Control => self.control_template_ratio,
            AbGroup::Hybrid => self.hybrid_template_ratio,
            AbGroup::Live => self.live_template_ratio,
        }
    }

    /// Validate ratios are probabilities. Called by the pipeline builder.
    pub(crate) fn validate(&self) -> crate::Result<()> {
        for (group, ratio) in [
            (AbGroup::Control, self.control_template_ratio),
            (AbGroup::Hybrid, self.hybrid_template_ratio),
            (AbGroup::Live, self.live_template_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) || ratio.is_nan() {
                return Err(crate::SkaldError::Configuration(format!(
                    "template_ratio for {} must be within [0, 1], got {ratio}",
                    group.as_str()
                )));
            }
        }
        if self.invoke_timeout.is_zero() {
            return Err(crate::SkaldError::Configuration(
                "invoke_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ratios_are_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let config = StrategyConfig::new().template_ratio(AbGroup::Hybrid, 1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = StrategyConfig::new().invoke_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn ratio_lookup_per_group() {
        let config = StrategyConfig::new().template_ratio(AbGroup::Live, 0.25);
        assert_eq!(config.ratio_for(AbGroup::Live), 0.25);
        assert_eq!(config.ratio_for(AbGroup::Control), 0.9);
    }
}
