//! Builder for configuring pipeline instances.

use std::sync::Arc;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::StrategyConfig;
use crate::limiter::{RateLimitConfig, RateLimiter};
use crate::retry::RetryConfig;
use crate::traits::{CallerProfileStore, ExternalInvoker, TemplateRepository};
use crate::types::InvokeOptions;
use crate::{Result, SkaldError};

use super::Pipeline;

/// Main entry point for creating pipeline instances.
pub struct Skald;

impl Skald {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> SkaldBuilder {
        SkaldBuilder::new()
    }
}

/// Builder for configuring pipeline instances.
///
/// The three collaborators are mandatory; every config defaults to the
/// values documented on its type. `build()` validates the combined
/// configuration — a bad config is the pipeline's only fatal error, and
/// it happens here at startup rather than per request.
pub struct SkaldBuilder {
    rate_limit: RateLimitConfig,
    cache: CacheConfig,
    breaker: BreakerConfig,
    retry: RetryConfig,
    strategy: StrategyConfig,
    invoke_options: InvokeOptions,
    invoker: Option<Arc<dyn ExternalInvoker>>,
    templates: Option<Arc<dyn TemplateRepository>>,
    profiles: Option<Arc<dyn CallerProfileStore>>,
}

impl SkaldBuilder {
    pub fn new() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            strategy: StrategyConfig::default(),
            invoke_options: InvokeOptions::default(),
            invoker: None,
            templates: None,
            profiles: None,
        }
    }

    /// Set the external text-generation dependency (mandatory).
    pub fn invoker(mut self, invoker: Arc<dyn ExternalInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Set the template repository (mandatory).
    pub fn templates(mut self, templates: Arc<dyn TemplateRepository>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Set the caller profile store (mandatory).
    pub fn profiles(mut self, profiles: Arc<dyn CallerProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Override admission control settings.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Override response cache settings.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Override circuit breaker settings.
    pub fn breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    /// Override retry settings.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Override strategy selector settings.
    pub fn strategy(mut self, config: StrategyConfig) -> Self {
        self.strategy = config;
        self
    }

    /// Override options passed to the invoker.
    pub fn invoke_options(mut self, options: InvokeOptions) -> Self {
        self.invoke_options = options;
        self
    }

    /// Validate the configuration and build the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let invoker = self
            .invoker
            .ok_or_else(|| SkaldError::Configuration("no external invoker configured".into()))?;
        let templates = self
            .templates
            .ok_or_else(|| SkaldError::Configuration("no template repository configured".into()))?;
        let profiles = self
            .profiles
            .ok_or_else(|| SkaldError::Configuration("no profile store configured".into()))?;

        validate_positive("requests_per_minute", self.rate_limit.requests_per_minute)?;
        validate_positive("requests_per_hour", self.rate_limit.requests_per_hour)?;
        validate_positive("burst_limit", self.rate_limit.burst_limit)?;
        validate_positive("failure_threshold", self.breaker.failure_threshold)?;
        validate_positive("success_threshold", self.breaker.success_threshold)?;
        validate_positive("max_attempts", self.retry.max_attempts)?;
        if self.cache.max_entries == 0 {
            return Err(SkaldError::Configuration(
                "max_entries must be positive".into(),
            ));
        }
        self.strategy.validate()?;

        Ok(Pipeline::new(
            RateLimiter::new(self.rate_limit),
            ResponseCache::new(self.cache),
            CircuitBreaker::new(self.breaker),
            self.retry,
            self.strategy,
            self.invoke_options,
            invoker,
            templates,
            profiles,
        ))
    }
}

impl Default for SkaldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_positive(name: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(SkaldError::Configuration(format!(
            "{name} must be positive"
        )));
    }
    Ok(())
}
