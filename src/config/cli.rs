use crate::config::{
    parse_day, parse_header, DEFAULT_BASE_URL, DEFAULT_CACHE_FILE, DEFAULT_CURRENT_PERIOD_PATH,
    DEFAULT_OUTPUT_PATH,
};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_positive_number, validate_url, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "withdraw-stats")]
#[command(about = "Rebuilds a seller's sales history from the marketplace withdrawal pages")]
pub struct CliConfig {
    /// TOML configuration file; replaces the source/cache/output options below
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Session cookie sent with every request
    #[arg(long)]
    pub cookie: Option<String>,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(long = "header")]
    pub headers: Vec<String>,

    #[arg(long, default_value = "30")]
    pub timeout_seconds: u64,

    #[arg(long, default_value = "3")]
    pub retry_attempts: u32,

    #[arg(long, default_value = "3000")]
    pub retry_delay_ms: u64,

    #[arg(long, default_value = DEFAULT_CACHE_FILE)]
    pub cache_file: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output_path: String,

    #[arg(long, default_value = DEFAULT_CURRENT_PERIOD_PATH)]
    pub current_period_path: String,

    /// First day of the product report, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<String>,

    /// Last day of the product report, YYYY-MM-DD
    #[arg(long)]
    pub upto: Option<String>,

    /// Delete the local cache and exit
    #[arg(long)]
    pub clear_cache: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub log_json: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|raw| parse_header(raw).ok())
            .collect()
    }

    fn request_timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn cache_file(&self) -> &str {
        &self.cache_file
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn current_period_path(&self) -> &str {
        &self.current_period_path
    }

    fn period(&self) -> (Option<i64>, Option<i64>) {
        (
            self.from.as_deref().and_then(|v| parse_day("from", v).ok()),
            self.upto.as_deref().and_then(|v| parse_day("upto", v).ok()),
        )
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_url("base_url", &self.base_url)?;
        validate_path("cache_file", &self.cache_file)?;
        validate_path("output_path", &self.output_path)?;
        validate_positive_number("retry_attempts", self.retry_attempts as usize, 1)?;

        for raw in &self.headers {
            parse_header(raw)?;
        }
        if let Some(from) = &self.from {
            parse_day("from", from)?;
        }
        if let Some(upto) = &self.upto {
            parse_day("upto", upto)?;
        }
        Ok(())
    }
}
