//! Text generation: the Gemini client and the gateway that enforces
//! non-empty, non-repeating output on top of it.

mod gateway;
mod gemini;
mod style;

pub use gateway::{GeneratedReply, GenerationGateway};
pub use gemini::{parse_generate_content, GeminiClient};
pub use style::{build_prompt, directive};

use crate::http::HttpError;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(#[from] HttpError),
    #[error("generation response malformed: {0}")]
    MalformedResponse(String),
}

/// A service that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<String, GenerationError>;
}
