use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PREFIX: &str = "!";
pub const DEFAULT_YTDLP: &str = "yt-dlp";
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub token: String,
    pub prefix: String,
    pub ytdlp_path: String,
    pub extraction_timeout: Duration,
    /// `None` keeps queues unbounded.
    pub max_queue_length: Option<usize>,
}

impl Config {
    /// Reads the process environment. Call `dotenv` first if a `.env` file
    /// should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::MissingToken)?;

        let timeout_secs =
            parse_positive::<u64>("EXTRACTION_TIMEOUT_SECS", get("EXTRACTION_TIMEOUT_SECS"))?;

        Ok(Self {
            token: token.trim().to_string(),
            prefix: get("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            ytdlp_path: get("YTDLP_PATH").unwrap_or_else(|| DEFAULT_YTDLP.to_string()),
            extraction_timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_EXTRACTION_TIMEOUT),
            max_queue_length: parse_positive::<usize>("MAX_QUEUE_LENGTH", get("MAX_QUEUE_LENGTH"))?,
        })
    }
}

fn parse_positive<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(None);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}
