//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Secrets (platform token, generation key) may come from either; env wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var holding the chat platform token.
pub const PLATFORM_TOKEN_ENV: &str = "DISCORD_TOKEN";
/// Env var holding the generation service key.
pub const GENERATION_KEY_ENV: &str = "GOOGLE_API_KEY";
/// Env var overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG_PATH";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Chat platform endpoint, credential and channels to watch.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Text generation service settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// How replies are produced and paced.
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Whether a message warrants a reply at all.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Timeout and retry settings shared by every outbound call.
    #[serde(default)]
    pub http: HttpConfig,

    /// Send-only mode settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    /// REST base URL (default Discord API v9).
    #[serde(default = "default_platform_api_base")]
    pub api_base: String,
    /// User or bot token sent as the Authorization header. Overridden by DISCORD_TOKEN env.
    pub token: Option<String>,
    /// Channel ids polled round-robin.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_platform_api_base(),
            token: None,
            channels: Vec::new(),
        }
    }
}

fn default_platform_api_base() -> String {
    "https://discord.com/api/v9".to_string()
}

/// Which memo a generated response is deduplicated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoScope {
    /// One last-response memo per channel.
    #[default]
    Channel,
    /// A single memo shared by every channel.
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// When false, replies come from the static messages file.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Overridden by GOOGLE_API_KEY env.
    pub api_key: Option<String>,
    /// Calls allowed per message while the output is empty or repeats the previous one.
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: usize,
    #[serde(default)]
    pub memo_scope: MemoScope,
    /// Sent when every attempt came back empty or repeated.
    #[serde(default = "default_duplicate_fallback")]
    pub duplicate_fallback: String,
    /// Sent when the generation service cannot be reached or answers garbage.
    #[serde(default = "default_error_fallback")]
    pub error_fallback: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: default_generation_api_base(),
            model: default_generation_model(),
            api_key: None,
            attempt_budget: default_attempt_budget(),
            memo_scope: MemoScope::default(),
            duplicate_fallback: default_duplicate_fallback(),
            error_fallback: default_error_fallback(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_generation_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_generation_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_attempt_budget() -> usize {
    3
}

fn default_duplicate_fallback() -> String {
    "Sorry, I can't think of anything right now, but I'm here to help!".to_string()
}

fn default_error_fallback() -> String {
    "Sorry, I can't reply right now.".to_string()
}

/// Threaded reply to the observed message, or a freestanding message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    #[default]
    Reply,
    Send,
}

impl ReplyMode {
    /// Parse "reply" / "send" (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "reply" => Some(ReplyMode::Reply),
            "send" => Some(ReplyMode::Send),
            _ => None,
        }
    }
}

/// Language/tone of the style directive appended to generation prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StyleLanguage {
    #[default]
    #[serde(rename = "id")]
    Indonesian,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "pt")]
    Portuguese,
    /// Any unrecognised code. Uses the default directive.
    #[serde(rename = "unsupported")]
    #[serde(other)]
    Unsupported,
}

impl StyleLanguage {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "id" => StyleLanguage::Indonesian,
            "en" => StyleLanguage::English,
            "pt" => StyleLanguage::Portuguese,
            _ => StyleLanguage::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyConfig {
    #[serde(default)]
    pub mode: ReplyMode,
    #[serde(default)]
    pub language: StyleLanguage,
    /// Pause after polling a channel (default 30).
    #[serde(default = "default_read_delay_secs")]
    pub read_delay_secs: u64,
    /// Pause between deciding to reply and sending (default 5).
    #[serde(default = "default_reply_delay_secs")]
    pub reply_delay_secs: u64,
    /// Replace generation fallbacks with a random line from the messages file.
    #[serde(default)]
    pub use_static_fallback: bool,
    /// Line-oriented messages file. Relative paths resolve against the config file's parent.
    #[serde(default)]
    pub messages_file: Option<PathBuf>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            mode: ReplyMode::default(),
            language: StyleLanguage::default(),
            read_delay_secs: default_read_delay_secs(),
            reply_delay_secs: default_reply_delay_secs(),
            use_static_fallback: false,
            messages_file: None,
        }
    }
}

fn default_read_delay_secs() -> u64 {
    30
}

fn default_reply_delay_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyKind {
    /// Reply to questions always, to other messages with `probability`.
    #[default]
    Probabilistic,
    /// Reply with a canned response when the text matches a keyword category.
    KeywordCategorized,
}

/// A keyword category and the canned responses it draws from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default)]
    pub kind: PolicyKind,
    /// Messages with fewer words are never answered.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    /// Chance of replying to a non-question message, in [0, 1].
    #[serde(default = "default_probability")]
    pub probability: f64,
    /// Checked in order; first match wins. Only used by keywordCategorized.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::default(),
            min_words: default_min_words(),
            probability: default_probability(),
            categories: default_categories(),
        }
    }
}

fn default_min_words() -> usize {
    3
}

fn default_probability() -> f64 {
    0.3
}

fn category(name: &str, keywords: &[&str], responses: &[&str]) -> CategoryConfig {
    CategoryConfig {
        name: name.to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        responses: responses.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        category(
            "help",
            &["help", "assist", "support", "stuck", "how"],
            &[
                "Happy to help! What are you trying to do?",
                "Tell me a bit more and I'll see what I can do.",
                "Sure, let's figure it out together.",
            ],
        ),
        category(
            "sad",
            &["sad", "tired", "lonely", "upset", "bad", "cry"],
            &[
                "Sorry to hear that. Hang in there!",
                "That sounds rough. I'm here if you want to talk.",
                "Sending good vibes your way.",
            ],
        ),
        category(
            "positive",
            &["happy", "great", "awesome", "nice", "love", "thanks"],
            &[
                "Love to hear it!",
                "That's awesome!",
                "Nice, keep it up!",
            ],
        ),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry.
    Constant,
    /// Delay doubles per retry, capped at maxDelayMs.
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Per-request timeout (default 10000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per call including the first (default 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> usize {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Append log records here in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Fatal startup problems with the configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("platform token not configured (set DISCORD_TOKEN or platform.token)")]
    MissingPlatformToken,
    #[error("generation is enabled but no API key is configured (set GOOGLE_API_KEY or generation.apiKey)")]
    MissingGenerationKey,
    #[error("no channels configured (set platform.channels or pass --channel)")]
    NoChannels,
    #[error("policy.probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),
    #[error("http.maxAttempts must be at least 1")]
    ZeroAttempts,
}

/// Secrets resolved from env and config.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub platform_token: String,
    /// Present whenever generation is enabled.
    pub generation_key: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_non_blank(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok().as_deref())
}

/// Resolve the platform token: env DISCORD_TOKEN overrides config.
pub fn resolve_platform_token(config: &Config) -> Option<String> {
    env_non_blank(PLATFORM_TOKEN_ENV).or_else(|| non_blank(config.platform.token.as_deref()))
}

/// Resolve the generation key: env GOOGLE_API_KEY overrides config.
pub fn resolve_generation_key(config: &Config) -> Option<String> {
    env_non_blank(GENERATION_KEY_ENV).or_else(|| non_blank(config.generation.api_key.as_deref()))
}

/// Resolve every secret the relay needs; the generation key only when generation is enabled.
pub fn resolve_credentials(config: &Config) -> Result<Credentials, ConfigError> {
    let platform_token = resolve_platform_token(config).ok_or(ConfigError::MissingPlatformToken)?;
    let generation_key = if config.generation.enabled {
        Some(resolve_generation_key(config).ok_or(ConfigError::MissingGenerationKey)?)
    } else {
        None
    };
    Ok(Credentials {
        platform_token,
        generation_key,
    })
}

/// Check non-secret settings that would otherwise misbehave at runtime.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.platform.channels.iter().all(|c| c.trim().is_empty()) {
        return Err(ConfigError::NoChannels);
    }
    let p = config.policy.probability;
    if !(0.0..=1.0).contains(&p) {
        return Err(ConfigError::InvalidProbability(p));
    }
    if config.http.max_attempts == 0 {
        return Err(ConfigError::ZeroAttempts);
    }
    Ok(())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the static messages file: `reply.messagesFile` (relative to the config file's parent) or `messages.txt` beside the config.
pub fn resolve_messages_file(config: &Config, config_path: &Path) -> PathBuf {
    match &config.reply.messages_file {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent(config_path).join(p)
            }
        }
        _ => config_parent(config_path).join("messages.txt"),
    }
}

/// Load config from the given path, or the default path (or RELAY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving relative paths).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
