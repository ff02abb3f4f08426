//! Request context and invoker options.

use serde::{Deserialize, Serialize};

use super::caller::CallerTier;

/// One prior exchange between the caller and the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub caller: String,
    pub reply: String,
}

impl HistoryTurn {
    pub fn new(caller: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            reply: reply.into(),
        }
    }
}

/// Per-request context supplied by the host application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Conversation history, oldest first. The strategy selector only
    /// reads the most recent turns when assembling a prompt.
    pub history: Vec<HistoryTurn>,
    pub tier: CallerTier,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tier(mut self, tier: CallerTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn turn(mut self, caller: impl Into<String>, reply: impl Into<String>) -> Self {
        self.history.push(HistoryTurn::new(caller, reply));
        self
    }
}

/// Options passed to [`ExternalInvoker::generate`](crate::traits::ExternalInvoker::generate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeOptions {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 300,
            temperature: 0.9,
        }
    }
}

impl InvokeOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }
}
