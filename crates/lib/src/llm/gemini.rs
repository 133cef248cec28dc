//! Gemini `generateContent` client.

use crate::http::{HttpError, RetryClient};
use crate::llm::{GenerationError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Client for the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    http: RetryClient,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
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
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Extract `candidates[0].content.parts[0].text`. The text may be empty; a missing
/// field anywhere along the path is a [`GenerationError::MalformedResponse`].
pub fn parse_generate_content(raw: &str) -> Result<String, GenerationError> {
    let response: GenerateContentResponse = serde_json::from_str(raw)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            GenerationError::MalformedResponse("missing candidates[0].content.parts[0].text".to_string())
        })
}

impl GeminiClient {
    pub fn new(base_url: Option<String>, model: Option<String>, api_key: String, http: RetryClient) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            base_url,
            model,
            api_key,
            http,
        }
    }

    fn generate_content_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    /// POST /models/{model}:generateContent with a single user part.
    async fn generate_content(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let req = self
            .http
            .client()
            .post(self.generate_content_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .build()
            .map_err(|e| HttpError::Request(e.to_string()))?;
        let res = self.http.execute(req).await?;
        let raw = res.text().await.map_err(|e| {
            HttpError::Transient {
                status: None,
                message: e.to_string(),
                retry_after: None,
            }
        })?;
        parse_generate_content(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_candidate_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"hey there"},{"text":"ignored"}]}},{"content":{"parts":[{"text":"second"}]}}]}"#;
        assert_eq!(parse_generate_content(raw).expect("text"), "hey there");
    }

    #[test]
    fn empty_text_is_not_malformed() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#;
        assert_eq!(parse_generate_content(raw).expect("text"), "");
    }

    #[test]
    fn missing_shape_is_malformed() {
        for raw in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{}}]}}]}"#,
            "not json",
        ] {
            assert!(
                matches!(parse_generate_content(raw), Err(GenerationError::MalformedResponse(_))),
                "expected malformed for {raw}"
            );
        }
    }
}
