//! crates/summarizer_core/src/generation.rs
//!
//! The generation service: one templated request to the language model, with the
//! offline scaffold standing in whenever the model is missing or misbehaves.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::GenerationOptions;
use crate::ports::LanguageModelService;
use crate::prompt::{build_user_prompt, fallback_scaffold, post_process, SYSTEM_PROMPT};

/// Where a generated text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationSource {
    Model,
    Fallback { reason: String },
}

/// A generated text and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub source: GenerationSource,
}

#[derive(Clone)]
pub struct SummarizerService {
    model: Option<Arc<dyn LanguageModelService>>,
}

impl SummarizerService {
    /// Creates a service. `None` means no credential is configured.
    pub fn new(model: Option<Arc<dyn LanguageModelService>>) -> Self {
        Self { model }
    }

    pub fn offline() -> Self {
        Self { model: None }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Generates a document for `corpus`. Never fails: every failure of the
    /// external call degrades to the offline scaffold.
    pub async fn generate(&self, corpus: &str, options: &GenerationOptions) -> Generation {
        let Some(model) = &self.model else {
            return Self::fallback(options, "no language model configured".to_string());
        };

        let prompt = build_user_prompt(corpus, options);
        match model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => {
                let text = post_process(&raw);
                if text.is_empty() {
                    return Self::fallback(options, "language model returned no text".to_string());
                }
                info!(
                    "Generated {} characters for task '{}'.",
                    text.len(),
                    options.task.as_str()
                );
                Generation {
                    text,
                    source: GenerationSource::Model,
                }
            }
            Err(e) => Self::fallback(options, e.to_string()),
        }
    }

    fn fallback(options: &GenerationOptions, reason: String) -> Generation {
        warn!(
            "Using offline fallback for task '{}': {}",
            options.task.as_str(),
            reason
        );
        Generation {
            text: fallback_scaffold(options),
            source: GenerationSource::Fallback { reason },
        }
    }
}
