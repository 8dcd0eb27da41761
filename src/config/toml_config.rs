use crate::config::{
    parse_day, DEFAULT_BASE_URL, DEFAULT_CACHE_FILE, DEFAULT_CURRENT_PERIOD_PATH,
    DEFAULT_OUTPUT_PATH,
};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, StatsError};
use crate::utils::validation::{validate_path, validate_positive_number, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: Option<String>,
    pub cookie: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub current_period_path: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub from: Option<String>,
    pub upto: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| StatsError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SESSION_COOKIE})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| StatsError::ConfigValidation {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl ConfigProvider for TomlConfig {
    fn base_url(&self) -> &str {
        self.source.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn cookie(&self) -> Option<&str> {
        self.source.cookie.as_deref().filter(|c| !c.is_empty())
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.source
            .headers
            .as_ref()
            .map(|headers| {
                headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn request_timeout(&self) -> Option<Duration> {
        match self.source.timeout_seconds {
            Some(0) => None,
            Some(seconds) => Some(Duration::from_secs(seconds)),
            None => Some(Duration::from_secs(30)),
        }
    }

    fn retry_attempts(&self) -> u32 {
        self.retry.attempts.unwrap_or(3)
    }

    fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms.unwrap_or(3000))
    }

    fn cache_file(&self) -> &str {
        self.cache.file.as_deref().unwrap_or(DEFAULT_CACHE_FILE)
    }

    fn output_path(&self) -> &str {
        self.output.path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    fn current_period_path(&self) -> &str {
        self.source
            .current_period_path
            .as_deref()
            .unwrap_or(DEFAULT_CURRENT_PERIOD_PATH)
    }

    fn period(&self) -> (Option<i64>, Option<i64>) {
        (
            self.output.from.as_deref().and_then(|v| parse_day("output.from", v).ok()),
            self.output.upto.as_deref().and_then(|v| parse_day("output.upto", v).ok()),
        )
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_url("source.base_url", self.base_url())?;
        validate_path("cache.file", self.cache_file())?;
        validate_path("output.path", self.output_path())?;
        validate_positive_number("retry.attempts", self.retry_attempts() as usize, 1)?;

        if let Some(cookie) = &self.source.cookie {
            if cookie.contains("${") {
                return Err(StatsError::ConfigValidation {
                    field: "source.cookie".to_string(),
                    message: format!("unresolved environment variable in '{}'", cookie),
                });
            }
        }
        if let Some(from) = &self.output.from {
            parse_day("output.from", from)?;
        }
        if let Some(upto) = &self.output.upto {
            parse_day("output.upto", upto)?;
        }
        Ok(())
    }
}
