use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Turns kept per conversation before the oldest is evicted.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Top-level config (chatrelay.toml + CHATRELAY_* env overrides).
///
/// Built once at startup and shared read-only for the process lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub im: ImConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Completion service settings. Only `api_key` is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_image_count")]
    pub image_count: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            image_size: default_image_size(),
            image_count: default_image_count(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub strategy: HistoryStrategy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            strategy: HistoryStrategy::default(),
        }
    }
}

/// Locking strategy behind the history store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryStrategy {
    /// Per-key locking (shards of a concurrent map).
    #[default]
    Sharded,
    /// One mutex across every conversation.
    GlobalLock,
}

/// Chat-client ingress (synchronous direct replies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// When set, only messages from this conversation id are processed.
    pub group_id_only: Option<String>,
    /// Optional bearer token the client bridge must present.
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group_id_only: None,
            token: None,
        }
    }
}

/// Authentication mode for incoming IM callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    /// HMAC-SHA256 over the raw request body (X-Hub-Signature-256).
    HmacSha256,
    /// Static bearer token in the Authorization header.
    BearerToken,
    /// No authentication. Internal networks only.
    #[default]
    None,
}

/// IM platform credentials and callback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_im_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub sdk_app_id: u64,
    /// Account the relay speaks as; messages must address or mention it.
    #[serde(default)]
    pub admin_account: String,
    #[serde(default)]
    pub user_sig: String,
    #[serde(default)]
    pub callback_auth: WebhookAuthMode,
    pub callback_secret: Option<String>,
    /// Timeout for outbound REST sends.
    #[serde(default = "default_im_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ImConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_im_base_url(),
            sdk_app_id: 0,
            admin_account: String::new(),
            user_sig: String::new(),
            callback_auth: WebhookAuthMode::default(),
            callback_secret: None,
            timeout_secs: default_im_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// Max webhook events processed concurrently.
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_depth: default_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_image_size() -> String {
    "1024x1024".to_string()
}
fn default_image_count() -> u32 {
    1
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_im_base_url() -> String {
    "https://console.tim.qq.com".to_string()
}
fn default_im_timeout_secs() -> u64 {
    30
}
fn default_worker_count() -> usize {
    4
}
fn default_queue_depth() -> usize {
    256
}
fn default_fetch_timeout_secs() -> u64 {
    60
}

impl RelayConfig {
    /// Load config from a TOML file with CHATRELAY_* env var overrides.
    ///
    /// Nested keys use a double underscore in env vars, e.g.
    /// `CHATRELAY_OPENAI__API_KEY`. A missing file leaves every field at
    /// its default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CHATRELAY_").split("__"))
            .extract()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Reject configurations the relay cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.openai.api_key.trim().is_empty() {
            return Err(RelayError::Config("openai.api_key is required".into()));
        }
        if self.history.capacity == 0 {
            return Err(RelayError::Config("history.capacity must be at least 1".into()));
        }
        if self.workers.count == 0 || self.workers.queue_depth == 0 {
            return Err(RelayError::Config(
                "workers.count and workers.queue_depth must be at least 1".into(),
            ));
        }
        if self.im.enabled && self.im.admin_account.is_empty() {
            return Err(RelayError::Config(
                "im.admin_account is required when im.enabled = true".into(),
            ));
        }
        if self.im.callback_auth != WebhookAuthMode::None && self.im.callback_secret.is_none() {
            return Err(RelayError::Config(
                "im.callback_secret is required for the configured callback_auth".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chatrelay/chatrelay.toml", home)
}
