//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Frontdesk configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (SQLite database, log files).
    pub data_dir: std::path::PathBuf,

    /// Address the webhook server binds to.
    pub bind: std::net::SocketAddr,

    /// Sender identities that resolve to privileged roles.
    pub identities: RoleIdentities,

    /// Inbox buffering behavior.
    pub inbox: InboxConfig,

    /// Orchestrator behavior.
    pub agent: AgentConfig,

    /// Model backend configuration.
    pub llm: LlmConfig,

    /// Outbound messaging gateway configuration.
    pub transport: TransportConfig,
}

/// Privileged sender identifiers, digits-only normalized.
#[derive(Debug, Clone)]
pub struct RoleIdentities {
    /// Administrator / developer number (Root role).
    pub admin: String,
    /// Business owner number (Supervisor role).
    pub supervisor: String,
}

/// Inbox debounce and pacing configuration.
#[derive(Debug, Clone, Copy)]
pub struct InboxConfig {
    /// Silence required before a sender's burst is processed.
    pub debounce: Duration,
    /// Minimum artificial delay before replying.
    pub base_delay: Duration,
    /// Additional delay per concurrently-processing sender.
    pub load_factor: Duration,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(15),
            base_delay: Duration::from_secs(12),
            load_factor: Duration::from_millis(600),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum model round-trips per cycle.
    pub max_turns: usize,
    /// Persisted turns loaded as model context.
    pub history_limit: u32,
    /// Lowercase phrases in a client-facing reply that trigger a
    /// supervisor consultation.
    pub escalation_phrases: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 3,
            history_limit: 15,
            escalation_phrases: vec![
                "voy a consultar".into(),
                "consultaré directamente".into(),
            ],
        }
    }
}

/// Model backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the completion backend.
    pub api_key: String,
    /// Model name (e.g. `gemini-2.0-flash`).
    pub model: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Outbound messaging gateway configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Gateway API key.
    pub api_key: String,
    /// Gateway instance name.
    pub instance: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let data_dir = std::env::var("FRONTDESK_DATA_DIR")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .map(|d| d.join("frontdesk"))
                    .unwrap_or_else(|| std::path::PathBuf::from("./data"))
            });

        let bind = std::env::var("FRONTDESK_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".into())
            .parse()
            .map_err(|_| ConfigError::Invalid("FRONTDESK_BIND is not a socket address".into()))?;

        let identities = RoleIdentities {
            admin: digits_only(&require("FRONTDESK_ADMIN_NUMBER")?),
            supervisor: digits_only(&require("FRONTDESK_SUPERVISOR_NUMBER")?),
        };
        if identities.admin.is_empty() || identities.supervisor.is_empty() {
            return Err(ConfigError::Invalid(
                "admin and supervisor numbers must contain digits".into(),
            )
            .into());
        }

        let inbox = InboxConfig {
            debounce: env_secs("FRONTDESK_DEBOUNCE_SECONDS", 15.0)?,
            base_delay: env_secs("FRONTDESK_BASE_DELAY_SECONDS", 12.0)?,
            load_factor: env_secs("FRONTDESK_LOAD_FACTOR_SECONDS", 0.6)?,
        };

        let agent = AgentConfig::default();

        let llm = LlmConfig {
            api_key: require("GOOGLE_API_KEY")?,
            model: std::env::var("FRONTDESK_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into()),
            request_timeout: Duration::from_secs(30),
        };

        let transport = TransportConfig {
            base_url: require("EVOLUTION_URL")?,
            api_key: require("EVOLUTION_API_KEY")?,
            instance: std::env::var("EVOLUTION_INSTANCE").unwrap_or_else(|_| "frontdesk".into()),
            request_timeout: Duration::from_secs(15),
        };

        Ok(Self {
            data_dir,
            bind,
            identities,
            inbox,
            agent,
            llm,
            transport,
        })
    }
}

fn require(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingKey(key.into()).into()),
    }
}

fn env_secs(key: &str, default: f64) -> Result<Duration> {
    let secs = match std::env::var(key) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|_| ConfigError::Invalid(format!("{key} is not a number")))?,
        Err(_) => default,
    };
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid(format!("{key} must be non-negative")).into());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Strip everything but ASCII digits from a sender identifier.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
