//! Reply decision policy: whether an accepted message gets an answer, and how.
//!
//! Both policies share the same gate: short messages are ignored, questions are
//! always answered, anything else is answered with the configured probability.
//! The keyword-categorized policy then picks a canned response from the first
//! matching category, and declines when nothing matches.

use crate::channels::InboundMessage;
use crate::config::{CategoryConfig, PolicyConfig, PolicyKind};
use rand::seq::SliceRandom;
use rand::Rng;

/// Outcome of running the policy on one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Decline,
    /// Ask the response source (generation or static lines) for text.
    Generate,
    /// Send this canned response.
    Canned(String),
}

#[derive(Debug, Clone)]
pub struct ReplyPolicy {
    kind: PolicyKind,
    min_words: usize,
    probability: f64,
    categories: Vec<CategoryConfig>,
}

impl ReplyPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        let probability = if config.probability.is_finite() {
            config.probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            kind: config.kind,
            min_words: config.min_words,
            probability,
            categories: config.categories.clone(),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Word-count threshold, then `?`, then a coin flip with the configured probability.
    pub fn should_reply<R: Rng + ?Sized>(&self, message: &InboundMessage, rng: &mut R) -> bool {
        if message.word_count() < self.min_words {
            return false;
        }
        if message.text.contains('?') {
            return true;
        }
        rng.gen_bool(self.probability)
    }

    /// First category with a keyword present in `text`.
    pub fn classify(&self, text: &str) -> Option<&CategoryConfig> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();
        self.categories.iter().find(|category| {
            category.keywords.iter().any(|keyword| {
                let keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() {
                    false
                } else if keyword.contains(char::is_whitespace) {
                    lowered.contains(&keyword)
                } else {
                    words.iter().any(|w| *w == keyword)
                }
            })
        })
    }

    pub fn decide<R: Rng + ?Sized>(&self, message: &InboundMessage, rng: &mut R) -> Decision {
        if !self.should_reply(message, rng) {
            return Decision::Decline;
        }
        match self.kind {
            PolicyKind::Probabilistic => Decision::Generate,
            PolicyKind::KeywordCategorized => {
                let Some(category) = self.classify(&message.text) else {
                    log::debug!("no keyword category matched message {}", message.id);
                    return Decision::Decline;
                };
                match category.responses.choose(rng) {
                    Some(response) => {
                        log::debug!("message {} matched category {}", message.id, category.name);
                        Decision::Canned(response.clone())
                    }
                    None => Decision::Decline,
                }
            }
        }
    }
}
