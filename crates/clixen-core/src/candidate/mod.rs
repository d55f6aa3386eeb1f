//! Candidate workflow sources: template lookup and model synthesis.

pub mod parser;
pub mod synthesis;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CandidateError;

pub use parser::{extract_json_object, parse_candidate};
pub use synthesis::ChatCompletionSource;
pub use templates::{TemplateLibrary, WorkflowTemplate};

/// Produces raw candidate workflow JSON for a free-text intent.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn request_candidate(&self, intent: &str) -> Result<String, CandidateError>;
}

/// Use a built-in template when one matches well enough, otherwise ask the
/// synthesizer.
pub struct TemplateFirstSource {
    templates: TemplateLibrary,
    synthesizer: Arc<dyn CandidateSource>,
    min_score: usize,
}

impl TemplateFirstSource {
    pub fn new(templates: TemplateLibrary, synthesizer: Arc<dyn CandidateSource>) -> Self {
        Self {
            templates,
            synthesizer,
            min_score: 2,
        }
    }

    pub fn with_min_score(mut self, min_score: usize) -> Self {
        self.min_score = min_score.max(1);
        self
    }
}

#[async_trait]
impl CandidateSource for TemplateFirstSource {
    fn name(&self) -> &str {
        "template-first"
    }

    async fn request_candidate(&self, intent: &str) -> Result<String, CandidateError> {
        if let Some((template, score)) = self.templates.best_match(intent)
            && score >= self.min_score
        {
            debug!(template = template.key, score, "Template matched, skipping synthesis");
            return Ok(template.to_json().to_string());
        }
        self.synthesizer.request_candidate(intent).await
    }
}
