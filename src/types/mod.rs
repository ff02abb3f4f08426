//! Core types for the skald pipeline
//!
//! All boundary types live here: caller preferences, templates,
//! request context, and response envelopes.

pub mod caller;
pub mod request;
pub mod response;
pub mod template;

pub use caller::{AbGroup, CallerPreference, CallerTier, ContentMode, Level};
pub use request::{HistoryTurn, InvokeOptions, RequestContext};
pub use response::{PipelineResponse, ResponseSource};
pub use template::{ResponseCategory, Template, TemplateFilter};
