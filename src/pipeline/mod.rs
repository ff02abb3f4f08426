//! Pipeline orchestration.
//!
//! [`Pipeline`] wires the resilience components around the three
//! collaborators and exposes the single entry point
//! [`generate_response`](Pipeline::generate_response) plus read-only
//! diagnostics. Per request the flow is:
//!
//! admission → cache lookup → A/B path choice → template path (no
//! network) or live path (circuit breaker around the retrying invoker
//! call) → cache write → return.
//!
//! Every failure past admission degrades to the template fallback
//! chain, never to a raw error: the caller always receives a non-empty
//! string. Results degraded by an upstream failure are not written to
//! the cache; template-by-design results are.

mod builder;

pub use builder::{Skald, SkaldBuilder};

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::breaker::{CircuitBreaker, CircuitStatus};
use crate::cache::{CacheStats, ResponseCache, cache_key};
use crate::config::StrategyConfig;
use crate::error::DenyReason;
use crate::limiter::{RateLimitInfo, RateLimiter};
use crate::retry::{RetryConfig, with_retry};
use crate::strategy;
use crate::telemetry;
use crate::traits::{CallerProfileStore, ExternalInvoker, TemplateRepository};
use crate::types::{
    CallerPreference, InvokeOptions, PipelineResponse, RequestContext, ResponseSource,
    TemplateFilter,
};
use crate::{Result, SkaldError};

/// Quality score attached to cached live-path responses. Templates
/// carry their own editorial score; live generations get a neutral one.
const LIVE_QUALITY: f32 = 1.0;

/// Quality score attached to the hard-coded safe fallbacks.
const SAFE_FALLBACK_QUALITY: f32 = 0.5;

/// The resilient generation pipeline.
///
/// Construct once at process start via [`Skald::builder()`] and share
/// (it is `Send + Sync`); one instance owns all rate-limit, cache, and
/// circuit state.
pub struct Pipeline {
    limiter: RateLimiter,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    strategy: StrategyConfig,
    invoke_options: InvokeOptions,
    invoker: Arc<dyn ExternalInvoker>,
    templates: Arc<dyn TemplateRepository>,
    profiles: Arc<dyn CallerProfileStore>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        limiter: RateLimiter,
        cache: ResponseCache,
        breaker: CircuitBreaker,
        retry: RetryConfig,
        strategy: StrategyConfig,
        invoke_options: InvokeOptions,
        invoker: Arc<dyn ExternalInvoker>,
        templates: Arc<dyn TemplateRepository>,
        profiles: Arc<dyn CallerProfileStore>,
    ) -> Self {
        Self {
            limiter,
            cache,
            breaker,
            retry,
            strategy,
            invoke_options,
            invoker,
            templates,
            profiles,
        }
    }

    /// Generate a response for a caller. Total: never panics, never
    /// errors, always returns a non-empty string.
    ///
    /// A denied admission becomes an explicit slow-down message with a
    /// retry-after estimate; every other failure degrades internally to
    /// the template fallback chain.
    pub async fn generate_response(
        &self,
        caller_id: &str,
        text: &str,
        context: &RequestContext,
    ) -> String {
        match self.generate(caller_id, text, context).await {
            Ok(response) => response.text,
            Err(SkaldError::AdmissionDenied {
                reason,
                retry_after,
            }) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => "denied").increment(1);
                debug!(caller = caller_id, %reason, "admission denied");
                format!(
                    "Easy there! You're sending messages a little too fast. \
                     Give me about {} seconds and try again.",
                    retry_after.as_secs().max(1)
                )
            }
            // generate() only surfaces AdmissionDenied; anything else
            // would be a bug in the fallback chain. Degrade anyway.
            Err(e) => {
                error!(error = %e, "unexpected pipeline error, serving safe fallback");
                strategy::safe_fallback(CallerPreference::default().explicitness_level).to_string()
            }
        }
    }

    /// Generate a response, surfacing admission denial as an error.
    ///
    /// Hosts that want to render their own slow-down message use this;
    /// [`generate_response`](Self::generate_response) is the total
    /// convenience wrapper. The only error variant this returns is
    /// [`SkaldError::AdmissionDenied`].
    pub async fn generate(
        &self,
        caller_id: &str,
        text: &str,
        context: &RequestContext,
    ) -> Result<PipelineResponse> {
        let admission = self.limiter.check(caller_id);
        if !admission.allowed {
            return Err(SkaldError::AdmissionDenied {
                reason: admission.reason.unwrap_or(DenyReason::RateLimit),
                retry_after: admission.retry_after.unwrap_or_default(),
            });
        }
        self.limiter.record(caller_id);

        let preference = self.preference_for(caller_id).await;
        let key = cache_key(text, preference.mode, context.tier);

        if let Some(cached) = self.cache.get(key) {
            metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => "cache").increment(1);
            return Ok(PipelineResponse::new(cached, ResponseSource::Cache));
        }

        let template_ratio = self.strategy.ratio_for(preference.ab_group);
        let template_by_design = rand::thread_rng().gen_bool(template_ratio);

        let (reply, source, quality) = if template_by_design {
            let (reply, quality) = self.template_response(text, &preference).await;
            (reply, ResponseSource::Template, quality)
        } else {
            match self.live_response(text, &preference, context).await {
                Ok(generated) => (generated, ResponseSource::Live, LIVE_QUALITY),
                Err(e) => {
                    let reason = fallback_reason(&e);
                    error!(error = %e, reason, "live path failed, degrading to template");
                    metrics::counter!(telemetry::FALLBACKS_TOTAL, "reason" => reason)
                        .increment(1);
                    let (reply, quality) = self.template_response(text, &preference).await;
                    (reply, ResponseSource::Fallback, quality)
                }
            }
        };

        // Degraded results stay out of the cache, so the key remains
        // open for a canonical answer.
        if source.is_cacheable() {
            self.cache.insert(key, reply.clone(), quality);
        }

        metrics::counter!(telemetry::REQUESTS_TOTAL, "path" => source.as_str()).increment(1);
        Ok(PipelineResponse::new(reply, source))
    }

    /// Look up the caller's preference, degrading to defaults on a
    /// missing profile or a store error.
    async fn preference_for(&self, caller_id: &str) -> CallerPreference {
        match self.profiles.get(caller_id).await {
            Ok(Some(preference)) => preference,
            Ok(None) => CallerPreference::default(),
            Err(e) => {
                warn!(caller = caller_id, error = %e, "profile lookup failed, using defaults");
                CallerPreference::default()
            }
        }
    }

    /// Run the live path: assemble a prompt and call the invoker under
    /// the circuit breaker, with retry and a mandatory deadline.
    ///
    /// The breaker wraps the whole retrying operation as one logical
    /// call, so exhausted retries count as a single circuit failure.
    async fn live_response(
        &self,
        text: &str,
        preference: &CallerPreference,
        context: &RequestContext,
    ) -> Result<String> {
        let prompt = strategy::assemble_prompt(
            preference,
            text,
            &context.history,
            self.strategy.history_turns,
        );

        self.breaker
            .call(with_retry(&self.retry, "generate", || async {
                let call = self.invoker.generate(&prompt, &self.invoke_options);
                let generated = match tokio::time::timeout(self.strategy.invoke_timeout, call)
                    .await
                {
                    Ok(result) => result?,
                    Err(_) => return Err(SkaldError::Timeout),
                };
                if generated.trim().is_empty() {
                    return Err(SkaldError::EmptyResponse);
                }
                Ok(generated)
            }))
            .await
    }

    /// Run the template path, degrading through progressively looser
    /// filters: (category, level, mode) → level only → hard-coded safe
    /// fallback. Returns the text and its quality score for caching.
    async fn template_response(
        &self,
        text: &str,
        preference: &CallerPreference,
    ) -> (String, f32) {
        let category = strategy::classify(text);
        let level = preference.explicitness_level;

        let filter = TemplateFilter::new()
            .category(category)
            .level(level)
            .mode(preference.mode);
        let candidates = self.query_templates(&filter).await;
        if let Some(template) = {
            let mut rng = rand::thread_rng();
            strategy::pick_weighted(&candidates, &mut rng)
        } {
            return (template.text.clone(), template.quality_score);
        }

        debug!(
            category = category.as_str(),
            level = level.get(),
            "no exact template match, falling back to level-only"
        );
        let candidates = self.query_templates(&TemplateFilter::new().level(level)).await;
        if let Some(template) = {
            let mut rng = rand::thread_rng();
            strategy::pick_uniform(&candidates, &mut rng)
        } {
            return (template.text.clone(), template.quality_score);
        }

        (
            strategy::safe_fallback(level).to_string(),
            SAFE_FALLBACK_QUALITY,
        )
    }

    /// Query the repository, treating errors as an empty result so the
    /// fallback chain keeps moving.
    async fn query_templates(&self, filter: &TemplateFilter) -> Vec<crate::types::Template> {
        match self.templates.query(filter).await {
            Ok(templates) => templates,
            Err(e) => {
                warn!(error = %e, "template query failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Run one maintenance sweep: reap idle caller windows and drop
    /// expired cache entries. Hosts schedule this periodically.
    pub fn sweep(&self) {
        self.limiter.sweep_idle();
        self.cache.sweep_expired();
    }

    /// Read-only cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Read-only circuit status.
    pub fn circuit_status(&self) -> CircuitStatus {
        self.breaker.status()
    }

    /// Read-only rate-limit snapshot for one caller.
    pub fn rate_limit_info(&self, caller_id: &str) -> RateLimitInfo {
        self.limiter.info(caller_id)
    }
}

/// Metrics label for a live-path failure.
fn fallback_reason(e: &SkaldError) -> &'static str {
    match e {
        SkaldError::CircuitOpen { .. } => "circuit_open",
        SkaldError::RetriesExhausted { .. } => "retries_exhausted",
        _ => "upstream",
    }
}
