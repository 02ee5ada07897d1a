//! Per-purpose model routing.
//!
//! Intent classification and outline extraction are short, structured
//! calls; proposals and section prose are long-form. A cheaper model can
//! serve the former while a more capable one writes.

use crate::generation::Purpose;

/// Model routing strategy.
#[derive(Debug, Clone)]
pub enum RoutingStrategy {
    /// Use a single model for every call.
    Single(String),
    /// Use a cheaper model for triage calls, a capable model for writing.
    CheapTriage {
        /// Model for intent classification and outline extraction.
        triage_model: String,
        /// Model for proposals, section content and answers.
        writing_model: String,
    },
}

impl RoutingStrategy {
    /// Get the model to use for a given call purpose.
    pub fn model_for(&self, purpose: Purpose) -> &str {
        match self {
            RoutingStrategy::Single(model) => model,
            RoutingStrategy::CheapTriage {
                triage_model,
                writing_model,
            } => {
                if purpose.is_triage() {
                    triage_model
                } else {
                    writing_model
                }
            }
        }
    }
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        RoutingStrategy::Single(crate::DEFAULT_MODEL.to_string())
    }
}
