//! Caller preference types, validated at the pipeline boundary.

use serde::{Deserialize, Serialize};

use crate::{Result, SkaldError};

/// Explicitness level, constrained to 1..=5.
///
/// Constructed through [`Level::new`] so an out-of-range value is a
/// boundary error rather than a latent index bug deep in template
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Validate and wrap a raw level.
    pub fn new(raw: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(SkaldError::Configuration(format!(
                "explicitness level {raw} out of range {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(raw: u8) -> std::result::Result<Self, Self::Error> {
        Level::new(raw).map_err(|e| e.to_string())
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

/// Content mode a caller has opted into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    #[default]
    Casual,
    Romantic,
    Roleplay,
}

impl ContentMode {
    /// Stable name used in cache keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentMode::Casual => "casual",
            ContentMode::Romantic => "romantic",
            ContentMode::Roleplay => "roleplay",
        }
    }
}

/// Experiment cohort controlling the template/live mix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbGroup {
    /// Mostly pre-authored templates, cheapest.
    #[default]
    Control,
    /// Balanced template/live mix.
    Hybrid,
    /// Mostly live generation, most expensive.
    Live,
}

impl AbGroup {
    /// Stable name used in logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            AbGroup::Control => "control",
            AbGroup::Hybrid => "hybrid",
            AbGroup::Live => "live",
        }
    }
}

/// Paying tier of a caller. Part of the cache key so free and premium
/// callers never share cached responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerTier {
    #[default]
    Free,
    Premium,
    Vip,
}

impl CallerTier {
    /// Stable name used in cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            CallerTier::Free => "free",
            CallerTier::Premium => "premium",
            CallerTier::Vip => "vip",
        }
    }
}

/// Read-only caller preference consumed by the strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerPreference {
    pub explicitness_level: Level,
    pub mode: ContentMode,
    pub ab_group: AbGroup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_accepts_valid_range() {
        for raw in 1..=5 {
            assert_eq!(Level::new(raw).unwrap().get(), raw);
        }
    }

    #[test]
    fn level_rejects_out_of_range() {
        assert!(Level::new(0).is_err());
        assert!(Level::new(6).is_err());
    }

    #[test]
    fn default_preference_is_safest() {
        let pref = CallerPreference::default();
        assert_eq!(pref.explicitness_level.get(), 1);
        assert_eq!(pref.mode, ContentMode::Casual);
        assert_eq!(pref.ab_group, AbGroup::Control);
    }
}
