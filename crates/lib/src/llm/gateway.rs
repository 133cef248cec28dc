//! Generation gateway: prompt building, anti-repetition and fallbacks.
//!
//! The gateway never fails its caller. Service errors and malformed responses
//! become the configured error fallback; output that stays empty or identical to
//! the previous response for the whole attempt budget becomes the duplicate
//! fallback. Only fresh output is remembered in the memo.

use crate::config::{GenerationConfig, MemoScope, StyleLanguage};
use crate::llm::style::build_prompt;
use crate::llm::TextGenerator;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const GLOBAL_MEMO_KEY: &str = "*";

/// Text to send, and whether it is a canned fallback rather than fresh output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub fallback: bool,
}

impl GeneratedReply {
    fn fresh(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fallback: false,
        }
    }

    fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fallback: true,
        }
    }
}

pub struct GenerationGateway {
    generator: Arc<dyn TextGenerator>,
    /// Last fresh response per memo key (channel id, or the global key).
    memo: Mutex<HashMap<String, String>>,
    scope: MemoScope,
    attempt_budget: usize,
    duplicate_fallback: String,
    error_fallback: String,
}

impl GenerationGateway {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            memo: Mutex::new(HashMap::new()),
            scope: config.memo_scope,
            attempt_budget: config.attempt_budget.max(1),
            duplicate_fallback: config.duplicate_fallback.clone(),
            error_fallback: config.error_fallback.clone(),
        }
    }

    fn memo_key(&self, channel_id: &str) -> String {
        match self.scope {
            MemoScope::Channel => channel_id.to_string(),
            MemoScope::Global => GLOBAL_MEMO_KEY.to_string(),
        }
    }

    /// Last fresh response remembered for the channel (or globally, depending on scope).
    pub async fn last_response(&self, channel_id: &str) -> Option<String> {
        self.memo.lock().await.get(&self.memo_key(channel_id)).cloned()
    }

    /// Generate a reply to `source_text` for `channel_id`.
    ///
    /// The memo lock is held for the whole call so concurrent callers sharing a
    /// memo key observe each other's results in order.
    pub async fn generate(
        &self,
        channel_id: &str,
        source_text: &str,
        language: StyleLanguage,
    ) -> GeneratedReply {
        let prompt = build_prompt(source_text, language);
        let key = self.memo_key(channel_id);
        let mut memo = self.memo.lock().await;
        let previous = memo.get(&key).cloned();

        for attempt in 1..=self.attempt_budget {
            let raw = match self.generator.generate_content(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("generation failed for {}: {}", channel_id, e);
                    return GeneratedReply::fallback(self.error_fallback.as_str());
                }
            };
            let text = raw.trim();
            if text.is_empty() {
                log::warn!(
                    "generation attempt {}/{} for {} returned empty text",
                    attempt,
                    self.attempt_budget,
                    channel_id
                );
                continue;
            }
            if previous.as_deref() == Some(text) {
                log::warn!(
                    "generation attempt {}/{} for {} repeated the previous response",
                    attempt,
                    self.attempt_budget,
                    channel_id
                );
                continue;
            }
            memo.insert(key.clone(), text.to_string());
            return GeneratedReply::fresh(text);
        }

        log::warn!(
            "generation for {} stayed empty or repeated after {} attempt(s), using fallback",
            channel_id,
            self.attempt_budget
        );
        GeneratedReply::fallback(self.duplicate_fallback.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpError;
    use crate::llm::GenerationError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns scripted results in order, then repeats the last one.
    struct Scripted {
        outputs: std::sync::Mutex<VecDeque<Result<String, ()>>>,
        calls: AtomicUsize,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outputs: Vec<Result<&str, ()>>) -> Arc<Self> {
            Arc::new(Self {
                outputs: std::sync::Mutex::new(
                    outputs.into_iter().map(|r| r.map(str::to_string)).collect(),
                ),
                calls: AtomicUsize::new(0),
                prompts: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate_content(&self, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut outputs = self.outputs.lock().unwrap();
            let next = if outputs.len() > 1 {
                outputs.pop_front()
            } else {
                outputs.front().cloned()
            };
            match next {
                Some(Ok(text)) => Ok(text),
                _ => Err(GenerationError::Http(HttpError::RetriesExhausted {
                    attempts: 3,
                    last: Box::new(HttpError::Transient {
                        status: Some(503),
                        message: "unavailable".to_string(),
                        retry_after: None,
                    }),
                })),
            }
        }
    }

    fn gateway(generator: Arc<Scripted>, scope: MemoScope) -> GenerationGateway {
        let config = GenerationConfig {
            memo_scope: scope,
            ..GenerationConfig::default()
        };
        GenerationGateway::new(generator, &config)
    }

    #[tokio::test]
    async fn empty_outputs_are_retried_within_budget() {
        let generator = Scripted::new(vec![Ok(""), Ok("  "), Ok("third time lucky")]);
        let gw = gateway(generator.clone(), MemoScope::Channel);
        let reply = gw.generate("C1", "hello", StyleLanguage::English).await;
        assert_eq!(reply, GeneratedReply::fresh("third time lucky"));
        assert_eq!(generator.calls(), 3);
        assert_eq!(gw.last_response("C1").await.as_deref(), Some("third time lucky"));
    }

    #[tokio::test]
    async fn consecutive_fresh_replies_differ() {
        let generator = Scripted::new(vec![Ok("same"), Ok("same"), Ok("different")]);
        let gw = gateway(generator.clone(), MemoScope::Channel);
        let first = gw.generate("C1", "a", StyleLanguage::English).await;
        let second = gw.generate("C1", "b", StyleLanguage::English).await;
        assert_eq!(first.text, "same");
        assert_eq!(second.text, "different");
        assert!(!second.fallback);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn persistent_repetition_yields_duplicate_fallback() {
        let generator = Scripted::new(vec![Ok("echo")]);
        let gw = gateway(generator.clone(), MemoScope::Channel);
        assert_eq!(gw.generate("C1", "a", StyleLanguage::English).await.text, "echo");

        let reply = gw.generate("C1", "b", StyleLanguage::English).await;
        assert!(reply.fallback);
        assert_eq!(reply.text, GenerationConfig::default().duplicate_fallback);
        assert_eq!(generator.calls(), 1 + 3);
        assert_eq!(gw.last_response("C1").await.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn request_failure_yields_error_fallback() {
        let generator = Scripted::new(vec![Err(())]);
        let gw = gateway(generator.clone(), MemoScope::Channel);
        let reply = gw.generate("C1", "a", StyleLanguage::English).await;
        assert!(reply.fallback);
        assert_eq!(reply.text, GenerationConfig::default().error_fallback);
        assert_eq!(generator.calls(), 1);
        assert_eq!(gw.last_response("C1").await, None);
    }

    #[tokio::test]
    async fn channel_scope_keeps_memos_apart() {
        let generator = Scripted::new(vec![Ok("same")]);
        let gw = gateway(generator.clone(), MemoScope::Channel);
        assert_eq!(gw.generate("C1", "a", StyleLanguage::English).await.text, "same");
        let other = gw.generate("C2", "a", StyleLanguage::English).await;
        assert_eq!(other, GeneratedReply::fresh("same"));
    }

    #[tokio::test]
    async fn global_scope_dedups_across_channels() {
        let generator = Scripted::new(vec![Ok("same")]);
        let gw = gateway(generator.clone(), MemoScope::Global);
        assert_eq!(gw.generate("C1", "a", StyleLanguage::English).await.text, "same");
        assert!(gw.generate("C2", "a", StyleLanguage::English).await.fallback);
    }

    #[tokio::test]
    async fn fresh_text_is_trimmed_and_prompt_carries_directive() {
        let generator = Scripted::new(vec![Ok("  padded reply \n")]);
        let gw = gateway(generator.clone(), MemoScope::Channel);
        let reply = gw.generate("C1", "source text", StyleLanguage::English).await;
        assert_eq!(reply.text, "padded reply");
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts[0], build_prompt("source text", StyleLanguage::English));
    }
}
