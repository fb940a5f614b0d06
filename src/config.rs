//! Process configuration.
//!
//! Every value the service needs is enumerated here and validated once at
//! startup. Components receive the pieces they need by reference; nothing
//! reads the environment after [`Config::from_env`] returns.

pub mod settings;

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub use settings::Settings;

/// Completion service providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    /// Groq (OpenAI-compatible wire format).
    Groq,
    /// OpenAI.
    OpenAi,
    /// Local Ollama, no key required.
    Ollama,
    /// Anthropic Claude.
    Claude,
}

impl AiProvider {
    fn default_model(self) -> &'static str {
        match self {
            Self::Groq => "llama3-8b-8192",
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3",
            Self::Claude => "claude-3-5-haiku-latest",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai",
            Self::OpenAi => "https://api.openai.com",
            Self::Ollama => "http://localhost:11434",
            Self::Claude => "https://api.anthropic.com",
        }
    }

    /// Keys searched, in order, for the provider's API key.
    fn api_key_vars(self) -> &'static [&'static str] {
        match self {
            Self::Groq => &["GROQ_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Ollama => &[],
            Self::Claude => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        }
    }
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "claude" | "anthropic" => Ok(Self::Claude),
            other => Err(format!(
                "unknown provider '{other}' (expected groq, openai, ollama or claude)"
            )),
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Groq => write!(f, "Groq"),
            Self::OpenAi => write!(f, "OpenAI"),
            Self::Ollama => write!(f, "Ollama"),
            Self::Claude => write!(f, "Anthropic"),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Selected provider.
    pub provider: AiProvider,
    /// API key; `None` only for Ollama.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Service root URL.
    pub base_url: String,
    /// Bounded output size.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// SMTP delivery settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay host.
    pub host: String,
    /// Relay port, STARTTLS on 587.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Sender address.
    pub from: String,
}

/// SendGrid v3 API delivery settings.
#[derive(Debug, Clone)]
pub struct SendGridConfig {
    /// API key.
    pub api_key: String,
    /// Verified sender address.
    pub sender: String,
    /// API root URL.
    pub base_url: String,
}

/// Mail transport selection.
#[derive(Debug, Clone)]
pub enum MailConfig {
    /// Deliver through an SMTP relay.
    Smtp(SmtpConfig),
    /// Deliver through the SendGrid HTTP API.
    SendGrid(SendGridConfig),
}

/// Which commits of a webhook batch the server processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitScope {
    /// Only the first commit of the batch.
    #[default]
    First,
    /// Every commit of the batch.
    All,
}

impl FromStr for CommitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "all" => Ok(Self::All),
            other => Err(format!("expected 'first' or 'all', got '{other}'")),
        }
    }
}

/// Where attachment content is materialized before it is mailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagingMode {
    /// Build the attachment buffer directly in memory.
    #[default]
    Memory,
    /// Round-trip the content through a transient file.
    Disk,
}

impl FromStr for StagingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            other => Err(format!("expected 'memory' or 'disk', got '{other}'")),
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Webhook batch handling.
    pub commit_scope: CommitScope,
    /// Files analyzed in parallel within one commit.
    pub concurrency: usize,
    /// Deadline for one completion call.
    pub analysis_timeout: Duration,
    /// Deadline for all completion calls of one commit.
    pub commit_timeout: Duration,
    /// Attachment staging strategy.
    pub staging_mode: StagingMode,
    /// Directory for disk staging.
    pub staging_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            commit_scope: CommitScope::First,
            concurrency: 1,
            analysis_timeout: Duration::from_secs(60),
            commit_timeout: Duration::from_secs(300),
            staging_mode: StagingMode::Memory,
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: SocketAddr,
    /// Recipient of `/test-email`.
    pub test_recipient: Option<String>,
}

/// Complete, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion service.
    pub ai: AiConfig,
    /// Mail transport.
    pub mail: MailConfig,
    /// HTTP server.
    pub server: ServerConfig,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Loads configuration from the environment with settings-file fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings =
            Settings::load().map_err(|e| ConfigError::invalid("settings.json", format!("{e:#}")))?;
        Self::from_lookup(|key| settings.get_env_var(key))
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source(lookup);
        Ok(Self {
            ai: load_ai(&source)?,
            mail: load_mail(&source)?,
            server: load_server(&source)?,
            pipeline: load_pipeline(&source)?,
        })
    }
}

/// Key lookup with typed accessors.
struct Source<F>(F);

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.optional(key))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
            None => Ok(default),
        }
    }

    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parsed(key, default)?;
        if secs == 0 {
            return Err(ConfigError::invalid(key, "must be greater than zero"));
        }
        Ok(Duration::from_secs(secs))
    }

    fn url(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        url::Url::parse(&raw).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        Ok(raw)
    }
}

fn load_ai<F: Fn(&str) -> Option<String>>(source: &Source<F>) -> Result<AiConfig, ConfigError> {
    let provider: AiProvider = source.parsed("AI_PROVIDER", AiProvider::Groq)?;

    let key_vars = provider.api_key_vars();
    let api_key = source.first_of(key_vars);
    if api_key.is_none() {
        if let Some(first) = key_vars.first() {
            return Err(ConfigError::Missing((*first).to_string()));
        }
    }

    let temperature: f64 = source.parsed("AI_TEMPERATURE", 0.2)?;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::invalid(
            "AI_TEMPERATURE",
            "must be between 0.0 and 2.0",
        ));
    }

    let max_tokens: u32 = source.parsed("AI_MAX_TOKENS", 1000)?;
    if max_tokens == 0 {
        return Err(ConfigError::invalid("AI_MAX_TOKENS", "must be greater than zero"));
    }

    Ok(AiConfig {
        provider,
        api_key,
        model: source
            .optional("AI_MODEL")
            .unwrap_or_else(|| provider.default_model().to_string()),
        base_url: source.url("AI_BASE_URL", provider.default_base_url())?,
        max_tokens,
        temperature,
        request_timeout: source.seconds("ANALYSIS_TIMEOUT_SECS", 60)?,
    })
}

fn load_mail<F: Fn(&str) -> Option<String>>(source: &Source<F>) -> Result<MailConfig, ConfigError> {
    let transport = source.optional("MAIL_TRANSPORT").unwrap_or_else(|| {
        if source.optional("SENDGRID_API_KEY").is_some() {
            "sendgrid".to_string()
        } else {
            "smtp".to_string()
        }
    });

    match transport.to_ascii_lowercase().as_str() {
        "smtp" => {
            let username = source.required("SMTP_USER")?;
            Ok(MailConfig::Smtp(SmtpConfig {
                host: source.required("SMTP_HOST")?,
                port: source.parsed("SMTP_PORT", 587)?,
                password: source.required("SMTP_PASS")?,
                from: source.optional("MAIL_FROM").unwrap_or_else(|| username.clone()),
                username,
            }))
        }
        "sendgrid" => Ok(MailConfig::SendGrid(SendGridConfig {
            api_key: source.required("SENDGRID_API_KEY")?,
            sender: source.required("SENDGRID_VERIFIED_SENDER")?,
            base_url: source.url("SENDGRID_BASE_URL", "https://api.sendgrid.com")?,
        })),
        other => Err(ConfigError::invalid(
            "MAIL_TRANSPORT",
            format!("expected 'smtp' or 'sendgrid', got '{other}'"),
        )),
    }
}

fn load_server<F: Fn(&str) -> Option<String>>(
    source: &Source<F>,
) -> Result<ServerConfig, ConfigError> {
    let port: u16 = source.parsed("PORT", 3000)?;
    let bind = source
        .optional("BIND_ADDR")
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let listen_addr = format!("{bind}:{port}")
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

    Ok(ServerConfig {
        listen_addr,
        test_recipient: source.optional("TEST_EMAIL_RECIPIENT"),
    })
}

fn load_pipeline<F: Fn(&str) -> Option<String>>(
    source: &Source<F>,
) -> Result<PipelineConfig, ConfigError> {
    let concurrency: usize = source.parsed("ANALYSIS_CONCURRENCY", 1)?;
    if concurrency == 0 {
        return Err(ConfigError::invalid(
            "ANALYSIS_CONCURRENCY",
            "must be at least 1",
        ));
    }

    Ok(PipelineConfig {
        commit_scope: source.parsed("WEBHOOK_COMMIT_SCOPE", CommitScope::First)?,
        concurrency,
        analysis_timeout: source.seconds("ANALYSIS_TIMEOUT_SECS", 60)?,
        commit_timeout: source.seconds("COMMIT_TIMEOUT_SECS", 300)?,
        staging_mode: source.parsed("STAGING_MODE", StagingMode::Memory)?,
        staging_dir: source
            .optional("STAGING_DIR")
            .map_or_else(std::env::temp_dir, PathBuf::from),
    })
}
