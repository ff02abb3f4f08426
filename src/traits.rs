//! Collaborator traits consumed by the pipeline.
//!
//! The pipeline core owns no persistence and no network client. The
//! host application supplies three collaborators:
//!
//! - [`ExternalInvoker`] — the actual paid text-generation API
//! - [`TemplateRepository`] — pre-authored responses with quality scores
//! - [`CallerProfileStore`] — read-only caller preferences
//!
//! Keeping these behind traits means every test can inject mocks and
//! the resilience machinery (limiter, cache, breaker, retry) can be
//! exercised without touching the real upstream.

use async_trait::async_trait;

use crate::Result;
use crate::types::{CallerPreference, InvokeOptions, Template, TemplateFilter};

/// The paid external text-generation dependency.
///
/// Implementations should report failures through the skald taxonomy:
/// [`Timeout`](crate::SkaldError::Timeout),
/// [`RateLimited`](crate::SkaldError::RateLimited),
/// [`EmptyResponse`](crate::SkaldError::EmptyResponse), and
/// [`Network`](crate::SkaldError::Network). The retry loop treats all
/// four as transient.
#[async_trait]
pub trait ExternalInvoker: Send + Sync {
    /// Invoker name for logging/debugging.
    fn name(&self) -> &str;

    /// Generate text for an assembled prompt.
    async fn generate(&self, prompt: &str, options: &InvokeOptions) -> Result<String>;
}

/// Repository of pre-authored templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Return templates matching the filter, in repository order.
    ///
    /// An empty result is not an error; the strategy selector falls
    /// back to progressively looser filters.
    async fn query(&self, filter: &TemplateFilter) -> Result<Vec<Template>>;
}

/// Read-only store of caller preferences.
#[async_trait]
pub trait CallerProfileStore: Send + Sync {
    /// Look up a caller's preference.
    ///
    /// `None` means the caller has no stored profile; the pipeline
    /// substitutes [`CallerPreference::default()`], which is the most
    /// conservative setting.
    async fn get(&self, caller_id: &str) -> Result<Option<CallerPreference>>;
}
