//! Pipeline response envelope.

use serde::{Deserialize, Serialize};

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Served from the response cache, no path was run.
    Cache,
    /// Pre-authored template chosen by design (A/B split).
    Template,
    /// Live upstream generation.
    Live,
    /// Template chosen because the live path failed.
    Fallback,
}

impl ResponseSource {
    /// Stable name used in metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Template => "template",
            ResponseSource::Live => "live",
            ResponseSource::Fallback => "fallback",
        }
    }

    /// Whether a result from this source is the canonical answer for its
    /// cache key. Fallbacks after upstream failure are degraded and must
    /// not poison the cache; template-by-design results are canonical.
    pub fn is_cacheable(self) -> bool {
        !matches!(self, ResponseSource::Fallback)
    }
}

/// A produced response plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub text: String,
    pub source: ResponseSource,
}

impl PipelineResponse {
    pub fn new(text: impl Into<String>, source: ResponseSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_not_cacheable() {
        assert!(ResponseSource::Cache.is_cacheable());
        assert!(ResponseSource::Template.is_cacheable());
        assert!(ResponseSource::Live.is_cacheable());
        assert!(!ResponseSource::Fallback.is_cacheable());
    }
}
