use crate::domain::model::FetchedPage;
use crate::domain::ports::{ConfigProvider, PageFetcher};
use crate::utils::error::{Result, StatsError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::Client;

/// 以 reqwest 實作的頁面抓取；登入狀態由外部提供的 cookie / 標頭帶入
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(cookie) = config.cookie() {
            let value = HeaderValue::from_str(cookie).map_err(|e| {
                StatsError::InvalidConfigValue {
                    field: "cookie".to_string(),
                    value: "<hidden>".to_string(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(COOKIE, value);
        }

        for (name, value) in config.headers() {
            let invalid = |reason: String| StatsError::InvalidConfigValue {
                field: "headers".to_string(),
                value: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("withdraw-stats/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self::new(builder.build()?))
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        tracing::debug!("Making request to: {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        tracing::debug!("Response status: {} ({})", status, final_url);

        if !status.is_success() {
            return Err(StatsError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = response.text().await?;
        Ok(FetchedPage { final_url, body })
    }
}
