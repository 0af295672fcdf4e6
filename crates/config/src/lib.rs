use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "tiperc20.toml",
    "config/tiperc20.toml",
    "crates/config/tiperc20.toml",
    "../tiperc20.toml",
    "../config/tiperc20.toml",
];

/// Flat environment names understood by earlier deployments of the bot.
/// They take precedence over every other source.
const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SLACK_BOT_TOKEN", "slack.bot_token"),
    ("SLACK_APP_TOKEN", "slack.app_token"),
    ("SLACK_TIP_REACTION", "slack.tip_reaction"),
    ("SLACK_TIP_AMOUNT", "tip.amount"),
    ("ERC20_TOKEN_ADDRESS", "ledger.token_address"),
    ("ETH_API_ENDPOINT", "ledger.endpoint"),
    ("ETH_KEY_JSON", "ledger.key_json"),
    ("ETH_PASSWORD", "ledger.passphrase"),
    ("DATABASE_URL", "registry.url"),
    ("PORT", "http.port"),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub slack: SlackConfig,
    pub tip: TipConfig,
    pub ledger: LedgerConfig,
    pub registry: RegistryConfig,
}

impl AppConfig {
    /// Report every mandatory setting that is still empty.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut missing = Vec::new();

        if self.slack.bot_token.trim().is_empty() {
            missing.push("slack.bot_token");
        }
        if self.slack.app_token.trim().is_empty() {
            missing.push("slack.app_token");
        }
        if self.slack.tip_reaction.trim().is_empty() {
            missing.push("slack.tip_reaction");
        }
        if self.ledger.token_address.trim().is_empty() {
            missing.push("ledger.token_address");
        }
        if self.ledger.key_json.is_none() && self.ledger.key_file.is_none() {
            missing.push("ledger.key_json or ledger.key_file");
        }

        if !missing.is_empty() {
            anyhow::bail!("missing configuration: {}", missing.join(", "));
        }

        if self.tip.amount == 0 {
            anyhow::bail!("tip.amount must be greater than zero");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 20020,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot user token (`xoxb-`), used for the Web API.
    pub bot_token: String,
    /// App-level token (`xapp-`), used to open Socket Mode connections.
    pub app_token: String,
    pub tip_reaction: String,
    pub api_base_url: String,
    pub reconnect_delay_seconds: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            app_token: String::new(),
            tip_reaction: "+1".to_string(),
            api_base_url: "https://slack.com/api".to_string(),
            reconnect_delay_seconds: 5,
        }
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("app_token", &redact(&self.app_token))
            .field("tip_reaction", &self.tip_reaction)
            .field("api_base_url", &self.api_base_url)
            .field("reconnect_delay_seconds", &self.reconnect_delay_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipConfig {
    /// Fixed transfer amount in token base units.
    pub amount: u64,
}

impl Default for TipConfig {
    fn default() -> Self {
        Self { amount: 1 }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub endpoint: String,
    pub token_address: String,
    #[serde(default)]
    pub key_json: Option<String>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    pub request_timeout_seconds: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            token_address: String::new(),
            key_json: None,
            key_file: None,
            passphrase: String::new(),
            chain_id: None,
            gas_limit: None,
            request_timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("endpoint", &self.endpoint)
            .field("token_address", &self.token_address)
            .field("key_json", &self.key_json.as_deref().map(redact))
            .field("key_file", &self.key_file)
            .field("passphrase", &redact(&self.passphrase))
            .field("chain_id", &self.chain_id)
            .field("gas_limit", &self.gas_limit)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    Sqlite,
    Memory,
}

impl RegistryBackend {
    fn as_str(self) -> &'static str {
        match self {
            RegistryBackend::Sqlite => "sqlite",
            RegistryBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    pub url: String,
    pub max_connections: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Sqlite,
            url: "sqlite://tiperc20.db".to_string(),
            max_connections: 5,
        }
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use tiperc20_config::load;
///
/// std::env::remove_var("TIPERC20_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("slack.bot_token", defaults.slack.bot_token.clone())?
        .set_default("slack.app_token", defaults.slack.app_token.clone())?
        .set_default("slack.tip_reaction", defaults.slack.tip_reaction.clone())?
        .set_default("slack.api_base_url", defaults.slack.api_base_url.clone())?
        .set_default(
            "slack.reconnect_delay_seconds",
            clamp_to_i64(defaults.slack.reconnect_delay_seconds),
        )?
        .set_default("tip.amount", clamp_to_i64(defaults.tip.amount))?
        .set_default("ledger.endpoint", defaults.ledger.endpoint.clone())?
        .set_default("ledger.token_address", defaults.ledger.token_address.clone())?
        .set_default("ledger.passphrase", defaults.ledger.passphrase.clone())?
        .set_default(
            "ledger.request_timeout_seconds",
            clamp_to_i64(defaults.ledger.request_timeout_seconds),
        )?
        .set_default("registry.backend", defaults.registry.backend.as_str())?
        .set_default("registry.url", defaults.registry.url.clone())?
        .set_default(
            "registry.max_connections",
            i64::from(defaults.registry.max_connections),
        )?;

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("TIPERC20_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via TIPERC20_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(config::Environment::with_prefix("TIPERC20").separator("__"));

    for (variable, key) in LEGACY_ENV_OVERRIDES {
        if let Ok(value) = std::env::var(variable) {
            debug!(variable, key, "applying legacy environment override");
            builder = builder
                .set_override(*key, value)
                .with_context(|| format!("invalid value in {variable}"))?;
        }
    }

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded bot configuration");
    Ok(config)
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_secrets() {
        let mut config = AppConfig::default();
        config.slack.bot_token = "xoxb-secret".to_string();
        config.slack.app_token = "xapp-secret".to_string();
        config.ledger.key_json = Some("{\"crypto\":{}}".to_string());
        config.ledger.passphrase = "hunter2".to_string();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("xoxb-secret"));
        assert!(!rendered.contains("xapp-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("crypto"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn validate_lists_every_missing_setting() {
        let error = AppConfig::default().validate().unwrap_err().to_string();
        assert!(error.contains("slack.bot_token"));
        assert!(error.contains("slack.app_token"));
        assert!(error.contains("ledger.token_address"));
        assert!(error.contains("ledger.key_json or ledger.key_file"));
    }

    #[test]
    fn validate_rejects_zero_amount() {
        let mut config = AppConfig::default();
        config.slack.bot_token = "xoxb".to_string();
        config.slack.app_token = "xapp".to_string();
        config.ledger.token_address = "0x0000000000000000000000000000000000000001".to_string();
        config.ledger.key_json = Some("{}".to_string());
        config.tip.amount = 0;

        let error = config.validate().unwrap_err().to_string();
        assert!(error.contains("tip.amount"));

        config.tip.amount = 1;
        assert!(config.validate().is_ok());
    }
}
