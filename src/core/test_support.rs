use crate::domain::model::{FetchedPage, SaleEvent, WithdrawalRecord};
use crate::domain::ports::{Clock, KeyValueStore, PageFetcher};
use crate::utils::error::{Result, StatsError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemoryStore {
    contents: Arc<Mutex<Option<Vec<u8>>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: Vec<u8>) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Some(bytes))),
            writes: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.contents.lock().await.clone()
    }

    pub async fn writes(&self) -> usize {
        *self.writes.lock().await
    }
}

impl KeyValueStore for MemoryStore {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents.lock().await.clone())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        *self.contents.lock().await = Some(data.to_vec());
        *self.writes.lock().await += 1;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        *self.contents.lock().await = None;
        Ok(())
    }
}

/// 依 URL 回應固定內容的假 fetcher；未登記的 URL 一律 503
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<Mutex<HashMap<String, FetchedPage>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn page(&self, url: &str, body: &str) {
        self.redirected(url, url, body).await;
    }

    pub async fn redirected(&self, url: &str, final_url: &str, body: &str) {
        self.pages.lock().await.insert(
            url.to_string(),
            FetchedPage {
                final_url: final_url.to_string(),
                body: body.to_string(),
            },
        );
    }

    pub async fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().await.iter().filter(|u| *u == url).count()
    }

    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait::async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.lock().await.push(url.to_string());
        self.pages
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| StatsError::HttpStatus {
                status: 503,
                url: url.to_string(),
            })
    }
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

pub fn resolved(
    identity: &str,
    time: i64,
    amount: f64,
    sales: &[(&str, i64, f64)],
) -> WithdrawalRecord {
    let mut products: BTreeMap<String, Vec<SaleEvent>> = BTreeMap::new();
    for (key, time, amount) in sales {
        products.entry(key.to_string()).or_default().push(SaleEvent {
            time: *time,
            amount: *amount,
        });
    }
    WithdrawalRecord {
        identity: identity.to_string(),
        time,
        amount,
        products: Some(products),
    }
}
