//! Companion configuration: clap flags with environment fallbacks

use std::time::Duration;

use clap::{Parser, ValueEnum};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3";

/// Residency the engine applies when it cannot make sense of `keep_alive`
const ENGINE_DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(300);

/// Parse an engine `keep_alive` value
///
/// Accepts bare seconds (`300`) or unit-suffixed parts (`30m`, `1h30m`,
/// `1500ms`). A negative value keeps the model loaded forever (`Ok(None)`).
pub fn parse_keep_alive(value: &str) -> Result<Option<Duration>, String> {
    let value = value.trim();
    if value.starts_with('-') {
        return Ok(None);
    }
    if let Ok(seconds) = value.parse::<u64>() {
        return Ok(Some(Duration::from_secs(seconds)));
    }

    let invalid = || format!("invalid keep_alive: {:?}", value);
    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];
        let unit = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        total += match &rest[..unit] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount * 60),
            "h" => Duration::from_secs(amount * 3600),
            _ => return Err(invalid()),
        };
        rest = &rest[unit..];
    }
    if value.is_empty() {
        return Err(invalid());
    }
    Ok(Some(total))
}

/// What to do with a request when every generation slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdmissionMode {
    /// Wait in FIFO order for a free slot
    Queue,
    /// Answer 503 with `Retry-After` straight away
    Reject,
}

impl std::fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "coursellm-local",
    version,
    about = "Admission-controlled companion for a local inference engine"
)]
pub struct LocalConfig {
    /// Interface to bind
    #[arg(long, env = "LOCAL_AI_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "LOCAL_AI_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the Ollama-compatible engine
    #[arg(long, env = "LOCAL_ENGINE_URL", default_value = DEFAULT_ENGINE_URL)]
    pub engine_url: String,

    /// Model used until a request or `POST /model` switches it
    #[arg(long, env = "LOCAL_DEFAULT_MODEL", default_value = DEFAULT_LOCAL_MODEL)]
    pub default_model: String,

    /// Generations allowed to run at once
    #[arg(long, env = "LOCAL_MAX_CONCURRENT", default_value_t = 1)]
    pub max_concurrent: usize,

    #[arg(long, env = "LOCAL_ADMISSION", value_enum, default_value_t = AdmissionMode::Queue)]
    pub admission: AdmissionMode,

    /// Longest a queued request waits for a slot; unset waits forever
    #[arg(long, env = "LOCAL_QUEUE_TIMEOUT_MS")]
    pub queue_timeout_ms: Option<u64>,

    /// Deadline for loading a model into memory
    #[arg(long, env = "LOCAL_WARMUP_TIMEOUT_MS", default_value_t = 120_000)]
    pub warmup_timeout_ms: u64,

    /// How long the engine keeps a warmed model resident
    #[arg(long, env = "LOCAL_KEEP_ALIVE", default_value = "30m")]
    pub keep_alive: String,

    /// Warm the default model before accepting requests
    #[arg(long, env = "LOCAL_WARM_ON_START")]
    pub warm_on_start: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            default_model: DEFAULT_LOCAL_MODEL.to_string(),
            max_concurrent: 1,
            admission: AdmissionMode::Queue,
            queue_timeout_ms: None,
            warmup_timeout_ms: 120_000,
            keep_alive: "30m".to_string(),
            warm_on_start: false,
        }
    }
}

impl LocalConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn queue_timeout(&self) -> Option<Duration> {
        self.queue_timeout_ms.map(Duration::from_millis)
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }

    /// How long the engine keeps a warmed model loaded; `None` means forever
    pub fn keep_alive_ttl(&self) -> Option<Duration> {
        parse_keep_alive(&self.keep_alive).unwrap_or(Some(ENGINE_DEFAULT_KEEP_ALIVE))
    }

    pub fn validate(&self) -> Result<(), String> {
        parse_keep_alive(&self.keep_alive)?;
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".to_string());
        }
        if !(self.engine_url.starts_with("http://") || self.engine_url.starts_with("https://")) {
            return Err(format!("engine_url must be an http(s) URL: {}", self.engine_url));
        }
        if self.default_model.trim().is_empty() {
            return Err("default_model must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = LocalConfig::try_parse_from([
            "coursellm-local",
            "--port",
            "4010",
            "--admission",
            "reject",
            "--max-concurrent",
            "2",
            "--queue-timeout-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(config.port, 4010);
        assert_eq!(config.admission, AdmissionMode::Reject);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.queue_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.listen_addr(), "127.0.0.1:4010");
    }

    #[test]
    fn test_default_is_valid() {
        let config = LocalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 3001);
        assert_eq!(config.engine_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_validate_rejects_zero_slots() {
        let config = LocalConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_engine_url() {
        let config = LocalConfig {
            engine_url: "localhost:11434".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_alive_forms() {
        assert_eq!(parse_keep_alive("30m"), Ok(Some(Duration::from_secs(1800))));
        assert_eq!(parse_keep_alive("1h30m"), Ok(Some(Duration::from_secs(5400))));
        assert_eq!(parse_keep_alive("1500ms"), Ok(Some(Duration::from_millis(1500))));
        assert_eq!(parse_keep_alive("90"), Ok(Some(Duration::from_secs(90))));
        assert_eq!(parse_keep_alive("-1"), Ok(None));
        assert!(parse_keep_alive("soon").is_err());
        assert!(parse_keep_alive("").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_keep_alive() {
        let config = LocalConfig {
            keep_alive: "5x".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.keep_alive_ttl(), Some(Duration::from_secs(300)));
    }
}
