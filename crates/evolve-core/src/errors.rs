//! Error types for the evolve core library.

use crate::generation::transport::TransportError;

/// Top-level error enum for the evolve core library.
#[derive(Debug, thiserror::Error)]
pub enum EvolveError {
    /// Source text did not parse under the selected grammar. Carries the
    /// offending text.
    #[error("Parse error ({language}): {message}")]
    Parse {
        language: String,
        message: String,
        source_text: String,
    },

    /// No credential was available, or every credential's call failed.
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The generation service replied with a suggestion list that could not
    /// be parsed.
    #[error("Malformed generation reply: {0}")]
    MalformedGenerationReply(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Binding for '{0}' has no suggestion engine")]
    MissingEngine(String),

    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("Unknown definition: {0}")]
    UnknownDefinition(String),

    #[error("Unsupported transform: {0}")]
    UnsupportedTransform(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Figment error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvolveError {
    pub fn parse(language: &str, message: impl Into<String>, source_text: &str) -> Self {
        Self::Parse {
            language: language.to_string(),
            message: message.into(),
            source_text: source_text.to_string(),
        }
    }

    /// True for the errors the wrapper recovers from by running the local
    /// heuristic analyzer.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            EvolveError::GenerationUnavailable(_)
                | EvolveError::MalformedGenerationReply(_)
                | EvolveError::Transport(_)
        )
    }
}

impl From<figment::Error> for EvolveError {
    fn from(err: figment::Error) -> Self {
        EvolveError::Figment(Box::new(err))
    }
}

pub type EvolveResult<T> = Result<T, EvolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_keeps_source() {
        let err = EvolveError::parse("python", "unexpected token", "def f(:\n");
        match &err {
            EvolveError::Parse { source_text, .. } => assert_eq!(source_text, "def f(:\n"),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("python"));
    }

    #[test]
    fn test_generation_failure_classification() {
        assert!(EvolveError::GenerationUnavailable("none".into()).is_generation_failure());
        assert!(!EvolveError::InvalidGoal("speed".into()).is_generation_failure());
    }
}
