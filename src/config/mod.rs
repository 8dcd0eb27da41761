#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::{Result, StatsError};
use chrono::NaiveDate;

pub const DEFAULT_BASE_URL: &str = "https://3ddd.ru";
pub const DEFAULT_CACHE_FILE: &str = "./cache/withdraw_stats_cache.json";
pub const DEFAULT_OUTPUT_PATH: &str = "./output";
pub const DEFAULT_CURRENT_PERIOD_PATH: &str = "user/income_new";

/// `YYYY-MM-DD` → 當天 00:00 (UTC) 的 epoch ms
pub fn parse_day(field: &str, value: &str) -> Result<i64> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
        .ok_or_else(|| StatsError::InvalidConfigValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "expected a YYYY-MM-DD date".to_string(),
        })
}

/// `Name: value` 形式的標頭
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(StatsError::InvalidConfigValue {
            field: "header".to_string(),
            value: raw.to_string(),
            reason: "expected 'Name: value'".to_string(),
        }),
    }
}
