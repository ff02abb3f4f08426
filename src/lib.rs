//! Skald - Resilient call pipeline for paid text-generation APIs
//!
//! This crate wraps calls to an external text-generation service in the
//! protection layers a paid dependency needs: per-caller rate limiting,
//! a value-aware response cache, a circuit breaker, retry with
//! exponential backoff, and an A/B-driven choice between pre-authored
//! templates and live generation. Failures never surface as raw errors;
//! every request degrades to a non-empty fallback.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use skald::{RequestContext, Skald};
//! # use skald::{CallerPreference, InvokeOptions, Result, Template, TemplateFilter};
//! # use async_trait::async_trait;
//! # struct MyInvoker;
//! # #[async_trait]
//! # impl skald::ExternalInvoker for MyInvoker {
//! #     fn name(&self) -> &str { "api" }
//! #     async fn generate(&self, _: &str, _: &InvokeOptions) -> Result<String> { Ok("hi".into()) }
//! # }
//! # struct MyTemplates;
//! # #[async_trait]
//! # impl skald::TemplateRepository for MyTemplates {
//! #     async fn query(&self, _: &TemplateFilter) -> Result<Vec<Template>> { Ok(vec![]) }
//! # }
//! # struct MyProfiles;
//! # #[async_trait]
//! # impl skald::CallerProfileStore for MyProfiles {
//! #     async fn get(&self, _: &str) -> Result<Option<CallerPreference>> { Ok(None) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> skald::Result<()> {
//!     let pipeline = Skald::builder()
//!         .invoker(Arc::new(MyInvoker))
//!         .templates(Arc::new(MyTemplates))
//!         .profiles(Arc::new(MyProfiles))
//!         .build()?;
//!
//!     let reply = pipeline
//!         .generate_response("caller-42", "hey, good morning!", &RequestContext::new())
//!         .await;
//!
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod pipeline;
pub mod retry;
pub mod strategy;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use error::{DenyReason, Result, SkaldError};
pub use pipeline::{Pipeline, Skald, SkaldBuilder};
pub use traits::{CallerProfileStore, ExternalInvoker, TemplateRepository};

// Re-export component configs and diagnostics
pub use breaker::{BreakerConfig, CircuitState, CircuitStatus};
pub use cache::{CacheConfig, CacheStats};
pub use config::StrategyConfig;
pub use limiter::{Admission, RateLimitConfig, RateLimitInfo};
pub use retry::RetryConfig;

// Re-export all boundary types
pub use types::{
    AbGroup, CallerPreference, CallerTier, ContentMode, HistoryTurn, InvokeOptions, Level,
    PipelineResponse, RequestContext, ResponseCategory, ResponseSource, Template, TemplateFilter,
};
