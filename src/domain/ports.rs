use crate::domain::model::FetchedPage;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// HTTP GET 原語：回傳跟隨重新導向後的 URL 與內容
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 單一鍵值的持久儲存（整份快取是一個值）
pub trait KeyValueStore: Send + Sync {
    fn read(&self) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write(&self, data: &[u8]) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn cookie(&self) -> Option<&str>;
    fn headers(&self) -> Vec<(String, String)>;
    fn request_timeout(&self) -> Option<Duration>;
    fn retry_attempts(&self) -> u32;
    fn retry_base_delay(&self) -> Duration;
    fn cache_file(&self) -> &str;
    fn output_path(&self) -> &str;
    fn current_period_path(&self) -> &str;
    /// 報表期間（含頭尾，epoch ms）
    fn period(&self) -> (Option<i64>, Option<i64>);
}
