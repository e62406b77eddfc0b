//! Generation gateway: credential rotation, retry and reply reconciliation.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::config::EvolveConfig;
use crate::errors::{EvolveError, EvolveResult};
use crate::generation::keys::KeyRotator;
use crate::generation::prompt::build_prompt;
use crate::generation::reply::{parse_reply, ReplyDefaults};
use crate::generation::transport::{GeminiTransport, Transport};
use crate::models::{sort_by_priority, Constraint, Goal, Suggestion, MAX_SUGGESTIONS};
use crate::source::language::SourceLanguage;

/// Everything one analysis pass sends to an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionRequest {
    pub language: SourceLanguage,
    pub source: String,
    pub goals: IndexSet<Goal>,
    pub constraints: Vec<Constraint>,
    /// Present on the instruction-driven path.
    pub instructions: Option<String>,
}

/// Produces suggestions for a request. The seam bindings depend on.
pub trait SuggestionEngine: Send + Sync {
    fn request_suggestions(&self, request: &SuggestionRequest) -> EvolveResult<Vec<Suggestion>>;
}

pub struct GenerationGateway {
    rotator: KeyRotator,
    transport: Arc<dyn Transport>,
    max_suggestions: usize,
}

impl GenerationGateway {
    pub fn new(rotator: KeyRotator, transport: Arc<dyn Transport>) -> Self {
        Self {
            rotator,
            transport,
            max_suggestions: MAX_SUGGESTIONS,
        }
    }

    pub fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions.max(1);
        self
    }

    /// Gemini transport plus credentials from the configured tokens and
    /// environment variables.
    pub fn from_config(config: &EvolveConfig) -> EvolveResult<Self> {
        let gateway = &config.gateway;
        let transport = GeminiTransport::new(&gateway.base_url, &gateway.model, gateway.timeout())?;
        let rotator = KeyRotator::from_sources(&gateway.api_keys, &gateway.api_key_env, |name| {
            std::env::var(name).ok()
        });
        info!(
            model = %gateway.model,
            credentials = rotator.len(),
            "initialized generation gateway"
        );
        Ok(Self::new(rotator, Arc::new(transport)).with_max_suggestions(config.max_suggestions))
    }

    pub fn credential_count(&self) -> usize {
        self.rotator.len()
    }

    /// Send the prompt, rotating credentials on failure; at most one attempt
    /// per known credential.
    fn generate(&self, prompt: &str) -> EvolveResult<String> {
        if self.rotator.is_empty() {
            return Err(EvolveError::GenerationUnavailable(
                "no credentials configured".to_string(),
            ));
        }
        let mut failures = Vec::new();
        for attempt in 1..=self.rotator.len() {
            let Some(credential) = self.rotator.next_credential() else {
                break;
            };
            match self.transport.send(prompt, &credential) {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "generation succeeded");
                    return Ok(text);
                }
                Err(err) => {
                    warn!(attempt, %credential, error = %err, "generation request failed");
                    failures.push(err.to_string());
                }
            }
        }
        Err(EvolveError::GenerationUnavailable(format!(
            "all credentials failed: {}",
            failures.join("; ")
        )))
    }
}

impl SuggestionEngine for GenerationGateway {
    fn request_suggestions(&self, request: &SuggestionRequest) -> EvolveResult<Vec<Suggestion>> {
        let prompt = build_prompt(request);
        let text = self.generate(&prompt)?;
        let defaults = ReplyDefaults::for_request(request.instructions.as_deref());
        let mut suggestions = match parse_reply(&text, &defaults) {
            Ok(suggestions) => suggestions,
            Err(err) => {
                warn!(error = %err, "discarding unparsable generation reply");
                Vec::new()
            }
        };
        sort_by_priority(&mut suggestions);
        suggestions.truncate(self.max_suggestions);
        debug!(count = suggestions.len(), "parsed suggestions");
        Ok(suggestions)
    }
}
