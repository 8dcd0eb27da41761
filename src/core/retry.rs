use crate::utils::error::{Result, StatsError};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(3000),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// 第 `attempt` 次失敗後的等待；最後一次之後不等
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        let remaining = self.attempts.max(1).saturating_sub(attempt);
        if remaining == 0 {
            None
        } else {
            Some(self.base_delay / remaining)
        }
    }
}

/// 最多執行 `policy.attempts` 次 `op`。
///
/// 兩次嘗試之間等待 `base_delay / 剩餘次數`。只重試 `is_retryable()` 的錯誤，
/// 其他錯誤原樣回傳；次數用盡時包成帶 `label` 的 `StatsError::Fetch`。
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        match policy.delay_after(attempt) {
            Some(delay) => {
                tracing::warn!(
                    "🔁 {}: attempt {}/{} failed ({}), retrying in {:?}",
                    label,
                    attempt,
                    policy.attempts,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                tracing::error!("❌ {}: giving up after {} attempts", label, attempt);
                return Err(StatsError::fetch(label, error));
            }
        }
    }
}
