//! The text-generation transport boundary and its Gemini HTTP implementation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::generation::keys::Credential;

/// Failures of a single exchange with the generation service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// The reply arrived but did not have the expected shape.
    #[error("Malformed envelope: {0}")]
    Envelope(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Sends one prompt with one credential and returns the generated text.
pub trait Transport: Send + Sync {
    fn send(&self, prompt: &str, credential: &Credential) -> Result<String, TransportError>;
}

// ---------------------------------------------------------------------------
// Gemini generateContent envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn request_body(prompt: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: vec![RequestContent {
            parts: vec![RequestPart { text: prompt }],
        }],
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a reply body.
fn extract_text(body: &str) -> Result<String, TransportError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| TransportError::Envelope(e.to_string()))?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| TransportError::Envelope("reply carries no candidate text".to_string()))
}

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl GeminiTransport {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

impl Transport for GeminiTransport {
    fn send(&self, prompt: &str, credential: &Credential) -> Result<String, TransportError> {
        let url = self.endpoint();
        debug!(%url, %credential, "sending generation request");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.expose())
            .json(&request_body(prompt))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        extract_text(&body)
    }
}
