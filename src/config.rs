use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_access_token: String,
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound for a single reply/push call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: String::new(),
            channel_secret: String::new(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Daily wall-clock time ("HH:MM", local time) at which everyone is reset to pending.
    #[serde(default = "default_trigger_time")]
    pub trigger_time: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    /// Any of these, found case-insensitively in a message, counts as an acknowledgment.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            trigger_time: default_trigger_time(),
            interval_minutes: default_interval_minutes(),
            tick_seconds: default_tick_seconds(),
            keywords: default_keywords(),
        }
    }
}

impl ReminderConfig {
    pub fn trigger(&self) -> Result<NaiveTime> {
        parse_trigger_time(&self.trigger_time)
    }

    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_seconds)
    }

    pub fn primary_keyword(&self) -> &str {
        self.keywords
            .iter()
            .map(|k| k.trim())
            .find(|k| !k.is_empty())
            .unwrap_or("eaten")
    }
}

fn default_trigger_time() -> String {
    "22:00".to_string()
}

fn default_interval_minutes() -> u32 {
    15
}

fn default_tick_seconds() -> u64 {
    60
}

fn default_keywords() -> Vec<String> {
    vec!["eaten".to_string(), "ate it".to_string(), "吃了".to_string()]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesConfig {
    pub confirmation: Option<String>,
    pub instruction: Option<String>,
    pub reminder: Option<String>,
}

/// Fully resolved texts sent to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub confirmation: String,
    pub instruction: String,
    pub reminder: String,
}

impl Config {
    pub fn messages(&self) -> Result<Messages> {
        let keyword = self.reminder.primary_keyword();
        let at = self.reminder.trigger()?.format("%H:%M");
        let m = &self.messages;
        Ok(Messages {
            confirmation: m.confirmation.clone().unwrap_or_else(|| {
                "Got it! Remember to take your medicine at the same time tomorrow.".to_string()
            }),
            instruction: m.instruction.clone().unwrap_or_else(|| {
                format!("Please reply \"{keyword}\" after {at} every day to stop the reminders.")
            }),
            reminder: m.reminder.clone().unwrap_or_else(|| {
                format!("Time to take your medicine! Reply \"{keyword}\" to stop the reminders.")
            }),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.line.channel_access_token.trim().is_empty() {
            anyhow::bail!("LINE channel access token missing. Set [line] channel_access_token or CHANNEL_ACCESS_TOKEN.");
        }
        if self.line.channel_secret.trim().is_empty() {
            anyhow::bail!("LINE channel secret missing. Set [line] channel_secret or CHANNEL_SECRET.");
        }
        self.reminder.trigger()?;
        if self.reminder.interval_minutes == 0 {
            anyhow::bail!("[reminder] interval_minutes must be greater than 0");
        }
        if self.reminder.tick_seconds == 0 {
            anyhow::bail!("[reminder] tick_seconds must be greater than 0");
        }
        if self.reminder.keywords.iter().all(|k| k.trim().is_empty()) {
            anyhow::bail!("[reminder] keywords must contain at least one non-empty entry");
        }
        Ok(())
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = get("CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token;
        }
        if let Some(secret) = get("CHANNEL_SECRET") {
            self.line.channel_secret = secret;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {port}"))?;
        }
        Ok(())
    }
}

pub fn parse_trigger_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("Invalid trigger_time '{s}', expected HH:MM"))
}

/// Load the config file (if any), then apply environment overrides, then
/// `port` from the command line.
pub fn load(path: &str, port: Option<u16>) -> Result<Config> {
    load_from(&expand_tilde(path), |key| std::env::var(key).ok(), port)
}

fn load_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
    port: Option<u16>,
) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config.toml")?
    } else {
        tracing::warn!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env(env)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    Ok(config)
}

pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medremind")
}

pub async fn init_config_dir() -> Result<PathBuf> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(&base).await?;

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(
            &config_path,
            r#"[line]
# Both can also come from CHANNEL_ACCESS_TOKEN / CHANNEL_SECRET
channel_access_token = "YOUR_CHANNEL_ACCESS_TOKEN"
channel_secret = "YOUR_CHANNEL_SECRET"
# api_base_url = "https://api.line.me"
request_timeout_secs = 10

[server]
host = "0.0.0.0"
port = 5000  # PORT env overrides

[reminder]
trigger_time = "22:00"
interval_minutes = 15
tick_seconds = 60
keywords = ["eaten", "ate it", "吃了"]

# [messages]
# confirmation = "Got it! Remember to take your medicine at the same time tomorrow."
# instruction = "Please reply \"eaten\" after 22:00 every day to stop the reminders."
# reminder = "Time to take your medicine! Reply \"eaten\" to stop the reminders."
"#,
        )
        .await?;
    }

    Ok(config_path)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
