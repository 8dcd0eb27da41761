//! 兩階段收集：先抓提領列表，再並行抓每筆提領的收入明細。

use crate::core::cache::PersistentCache;
use crate::core::decode::{sale_from_row, withdrawal_from_row};
use crate::core::extract::{extract_rows, Row};
use crate::core::pagination::resolve_pages;
use crate::core::retry::{retry, RetryPolicy};
use crate::domain::model::{CollectorEvent, SaleEvent, WithdrawalRecord};
use crate::domain::ports::{Clock, ConfigProvider, KeyValueStore, PageFetcher};
use crate::utils::error::{Result, StatsError};
use futures::future::try_join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, Mutex};

pub const WITHDRAW_HISTORY_LABEL: &str = "withdraw history";

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub base_url: String,
    pub withdraw_history_path: String,
    pub current_period_path: String,
    pub retry: RetryPolicy,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://3ddd.ru".to_string(),
            withdraw_history_path: "user/withdraw_history".to_string(),
            current_period_path: "user/income_new".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CollectorSettings {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            current_period_path: config.current_period_path().to_string(),
            retry: RetryPolicy::new(config.retry_attempts(), config.retry_base_delay()),
            ..Self::default()
        }
    }

    fn resource_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn withdraw_history_url(&self) -> String {
        self.resource_url(&self.withdraw_history_path)
    }

    /// 提領 `withdraw_stat/x` 的明細在 `user/withdraw_stat/x`；當期收入另有路徑
    pub fn detail_url(&self, record: &WithdrawalRecord) -> String {
        if record.is_current() {
            self.resource_url(&self.current_period_path)
        } else {
            self.resource_url(&format!("user/{}", record.identity))
        }
    }
}

/// 收集器事件的出口；接收端關閉後送出的事件直接丟棄
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<CollectorEvent>>);

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CollectorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(Some(tx)), rx)
    }

    pub fn emit(&self, event: CollectorEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome {
    /// 成功的記錄，依時間排序
    pub records: Vec<WithdrawalRecord>,
    /// 重試用盡而缺席的 identity
    pub failed: Vec<String>,
    pub offline: bool,
}

impl CollectionOutcome {
    pub fn last_update(&self) -> Option<i64> {
        self.records.last().map(|record| record.time)
    }
}

/// 一個收集器實例即一個執行把手：`run` 需要 `&mut self`，同一實例無法重入。
pub struct Collector<F: PageFetcher, S: KeyValueStore, C: Clock> {
    fetcher: F,
    cache: Mutex<PersistentCache<S>>,
    clock: C,
    settings: CollectorSettings,
    events: EventSink,
}

impl<F: PageFetcher, S: KeyValueStore, C: Clock> Collector<F, S, C> {
    pub fn new(fetcher: F, cache: PersistentCache<S>, clock: C, settings: CollectorSettings) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(cache),
            clock,
            settings,
            events: EventSink::default(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn cache(&mut self) -> &mut PersistentCache<S> {
        self.cache.get_mut()
    }

    pub fn into_cache(self) -> PersistentCache<S> {
        self.cache.into_inner()
    }

    pub async fn run(&mut self) -> Result<CollectionOutcome> {
        match self.collect().await {
            Ok(outcome) => {
                self.events.emit(CollectorEvent::Finished {
                    last_update: outcome.last_update(),
                });
                Ok(outcome)
            }
            Err(e) => {
                self.events.emit(CollectorEvent::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn collect(&mut self) -> Result<CollectionOutcome> {
        let (withdrawals, offline) = self.discover().await?;
        let total = withdrawals.len();
        tracing::info!(
            "📥 Resolving {} withdrawals ({} cached)",
            total,
            withdrawals.iter().filter(|w| w.is_resolved()).count()
        );

        let mut records = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut parse_error = None;
        {
            let this = &*self;
            let mut tasks: FuturesUnordered<_> =
                withdrawals.into_iter().map(|w| this.settle(w)).collect();

            let mut completed = 0;
            while let Some((identity, outcome)) = tasks.next().await {
                completed += 1;
                match outcome {
                    Ok(record) => records.push(record),
                    Err(e @ StatsError::Parse { .. }) => {
                        tracing::error!("❌ {}: {}", identity, e);
                        failed.push(identity);
                        parse_error.get_or_insert(e);
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Skipping {}: {}", identity, e);
                        failed.push(identity);
                    }
                }
                this.events.emit(CollectorEvent::Progress { completed, total });
            }
        }

        // 全部任務結束後才寫一次快取
        if let Err(e) = self.cache.get_mut().save().await {
            tracing::error!("❌ Failed to save cache: {}", e);
            self.events.emit(CollectorEvent::Warning {
                message: format!("cache not saved: {}", e),
            });
        }

        if let Some(e) = parse_error {
            return Err(e);
        }

        records.sort_by_key(|record| record.time);
        tracing::info!(
            "✅ Collected {} withdrawals, {} failed",
            records.len(),
            failed.len()
        );

        Ok(CollectionOutcome {
            records,
            failed,
            offline,
        })
    }

    /// 第一階段：提領列表，失敗時退回快取快照
    async fn discover(&mut self) -> Result<(Vec<WithdrawalRecord>, bool)> {
        let url = self.settings.withdraw_history_url();
        tracing::info!("🚀 Fetching withdraw history from {}", url);

        let listing = {
            let this = &*self;
            let url = url.as_str();
            retry(&this.settings.retry, WITHDRAW_HISTORY_LABEL, move || {
                this.collect_pages(url, withdrawal_from_row)
            })
            .await
        };

        let now = self.clock.now_millis();
        let cache = self.cache.get_mut();

        match listing {
            Ok(mut withdrawals) => {
                tracing::info!("📋 Found {} withdrawals", withdrawals.len());
                for withdrawal in withdrawals.iter_mut() {
                    if let Some(cached) = cache.get(&withdrawal.identity) {
                        *withdrawal = cached.clone();
                    }
                }
                withdrawals.push(WithdrawalRecord::current(now));
                Ok((withdrawals, false))
            }
            Err(e) if e.is_fetch() => {
                let snapshot = cache.snapshot();
                if snapshot.is_empty() {
                    return Err(e);
                }
                tracing::warn!("⚠️ {}; using {} cached withdrawals", e, snapshot.len());
                self.events.emit(CollectorEvent::Warning {
                    message: format!("{}; using local cache", e),
                });
                Ok((snapshot, true))
            }
            Err(e) => Err(e),
        }
    }

    /// 第二階段的單一任務：快取命中直接完成，否則抓明細並寫入快取
    async fn settle(&self, mut record: WithdrawalRecord) -> (String, Result<WithdrawalRecord>) {
        let identity = record.identity.clone();
        if record.is_resolved() {
            return (identity, Ok(record));
        }

        let url = self.settings.detail_url(&record);
        tracing::debug!("📡 {}: fetching {}", identity, url);

        let sales = {
            let url = url.as_str();
            retry(&self.settings.retry, &identity, move || {
                self.collect_pages(url, sale_from_row)
            })
            .await
        };

        let sales = match sales {
            Ok(sales) => sales,
            Err(e) => return (identity, Err(e)),
        };

        let mut products: BTreeMap<String, Vec<SaleEvent>> = BTreeMap::new();
        for (key, sale) in sales {
            products.entry(key).or_default().push(sale);
        }
        record.products = Some(products);
        record.sort_sales();

        if !record.is_current() {
            self.cache.lock().await.set(identity.clone(), record.clone());
        }

        (identity, Ok(record))
    }

    /// 抓第一頁、展開其餘頁面並行抓取，再把每頁的列交給 `parse`
    async fn collect_pages<T>(&self, url: &str, parse: fn(&Row<'_>) -> Result<T>) -> Result<Vec<T>> {
        let first = self.fetcher.fetch(url).await?;
        let pages = resolve_pages(&first)?;
        let rest = try_join_all(pages.map(|page| async move { self.fetcher.fetch(&page).await }))
            .await?;

        let mut items = Vec::new();
        for page in std::iter::once(&first).chain(rest.iter()) {
            for row in extract_rows(&page.body) {
                items.push(parse(&row)?);
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{resolved, FixedClock, MemoryStore, MockFetcher};
    use std::time::Duration;

    const BASE: &str = "https://3ddd.test";
    const NOW: i64 = 1_700_000_000_000;

    fn settings() -> CollectorSettings {
        CollectorSettings {
            base_url: BASE.to_string(),
            retry: RetryPolicy::new(3, Duration::from_millis(2)),
            ..CollectorSettings::default()
        }
    }

    fn withdrawal_row(date: &str, id: &str, amount: &str) -> String {
        format!(
            r#"<tr><td>{}</td><td><a href="/user/withdraw_stat/{}">open</a></td><td>card</td><td>{}</td></tr>"#,
            date, id, amount
        )
    }

    fn sale_row(date: &str, product: &str, amount: &str) -> String {
        format!(
            r#"<tr><td>{}</td><td><a href="/model/{}">{}</a></td><td>{}</td></tr>"#,
            date, product, product, amount
        )
    }

    fn url(path: &str) -> String {
        format!("{}/{}", BASE, path)
    }

    async fn collector(
        fetcher: MockFetcher,
        store: MemoryStore,
    ) -> Collector<MockFetcher, MemoryStore, FixedClock> {
        let cache = PersistentCache::load(store).await.unwrap();
        Collector::new(fetcher, cache, FixedClock(NOW), settings())
    }

    async fn scenario() -> MockFetcher {
        let fetcher = MockFetcher::new();
        fetcher
            .page(
                &url("user/withdraw_history"),
                &format!(
                    "<table>{}{}</table>",
                    withdrawal_row("01.03.2021", "A", "10"),
                    withdrawal_row("01.04.2021", "B", "20")
                ),
            )
            .await;
        fetcher
            .page(
                &url("user/withdraw_stat/A"),
                &sale_row("15.02.2021", "chair", "10"),
            )
            .await;
        fetcher
            .page(&url("user/income_new"), &sale_row("02.04.2021", "table", "5"))
            .await;
        fetcher
    }

    #[tokio::test]
    async fn test_failed_detail_is_dropped_not_fatal() {
        let fetcher = scenario().await;
        let store = MemoryStore::new();
        let (events, mut rx) = EventSink::channel();
        let mut collector = collector(fetcher.clone(), store.clone())
            .await
            .with_events(events);

        let outcome = collector.run().await.unwrap();

        let ids: Vec<&str> = outcome.records.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(ids, vec!["withdraw_stat/A", "current"]);
        assert_eq!(outcome.failed, vec!["withdraw_stat/B".to_string()]);
        assert!(!outcome.offline);
        assert_eq!(fetcher.calls_to(&url("user/withdraw_stat/B")).await, 3);

        let a = &outcome.records[0];
        assert_eq!(a.products.as_ref().unwrap().len(), 1);

        let cache = collector.into_cache();
        assert_eq!(cache.len(), 1);
        assert!(cache.has("withdraw_stat/A"));
        assert!(!cache.has("current"));
        assert_eq!(store.writes().await, 1);

        let mut progress = Vec::new();
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                CollectorEvent::Progress { completed, total } => progress.push((completed, total)),
                CollectorEvent::Finished { last_update } => finished = Some(last_update),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(finished, Some(Some(NOW)));
    }

    #[tokio::test]
    async fn test_warm_cache_skips_detail_fetches() {
        let fetcher = scenario().await;
        fetcher
            .page(&url("user/withdraw_stat/B"), &sale_row("20.03.2021", "lamp", "20"))
            .await;
        let store = MemoryStore::new();

        let first = collector(fetcher.clone(), store.clone()).await.run().await.unwrap();
        let calls_after_first = fetcher.total_calls().await;

        let second = collector(fetcher.clone(), store.clone()).await.run().await.unwrap();

        assert_eq!(fetcher.calls_to(&url("user/withdraw_stat/A")).await, 1);
        assert_eq!(fetcher.calls_to(&url("user/withdraw_stat/B")).await, 1);
        // 第二次只抓列表與當期收入
        assert_eq!(fetcher.total_calls().await, calls_after_first + 2);
        assert_eq!(first, second);
        assert_eq!(store.writes().await, 1);
    }

    #[tokio::test]
    async fn test_cached_entry_replaces_listing_row() {
        let fetcher = scenario().await;
        let cached = resolved(
            "withdraw_stat/B",
            1,
            99.0,
            &[("<a>cached</a>", 0, 99.0)],
        );
        let store = MemoryStore::with_contents(
            serde_json::to_vec(&BTreeMap::from([("withdraw_stat/B".to_string(), cached.clone())]))
                .unwrap(),
        );

        let outcome = collector(fetcher.clone(), store).await.run().await.unwrap();

        assert!(outcome.failed.is_empty());
        assert_eq!(fetcher.calls_to(&url("user/withdraw_stat/B")).await, 0);
        assert!(outcome.records.contains(&cached));
    }

    #[tokio::test]
    async fn test_offline_uses_cache_snapshot() {
        let fetcher = MockFetcher::new();
        let cached = resolved("withdraw_stat/A", 10, 10.0, &[("<a>chair</a>", 5, 10.0)]);
        let store = MemoryStore::new();
        {
            let mut cache = PersistentCache::load(store.clone()).await.unwrap();
            cache.set("withdraw_stat/A", cached.clone());
            cache.save().await.unwrap();
        }

        let (events, mut rx) = EventSink::channel();
        let outcome = collector(fetcher.clone(), store.clone())
            .await
            .with_events(events)
            .run()
            .await
            .unwrap();

        assert!(outcome.offline);
        assert_eq!(outcome.records, vec![cached]);
        assert_eq!(fetcher.total_calls().await, 3);
        assert_eq!(store.writes().await, 1);

        let first = rx.try_recv().unwrap();
        assert!(matches!(first, CollectorEvent::Warning { .. }));
    }

    #[tokio::test]
    async fn test_offline_with_empty_cache_propagates_fetch_error() {
        let fetcher = MockFetcher::new();
        let (events, mut rx) = EventSink::channel();
        let result = collector(fetcher, MemoryStore::new())
            .await
            .with_events(events)
            .run()
            .await;

        match result {
            Err(StatsError::Fetch { label, .. }) => assert_eq!(label, WITHDRAW_HISTORY_LABEL),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Ok(CollectorEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_listing_parse_error_is_not_masked_by_cache() {
        let fetcher = MockFetcher::new();
        fetcher
            .page(
                &url("user/withdraw_history"),
                "<tr><td>01.03.2021</td><td>broken</td></tr>",
            )
            .await;
        let store = MemoryStore::new();
        {
            let mut cache = PersistentCache::load(store.clone()).await.unwrap();
            cache.set("withdraw_stat/A", resolved("withdraw_stat/A", 1, 1.0, &[]));
            cache.save().await.unwrap();
        }

        let result = collector(fetcher.clone(), store).await.run().await;

        assert!(matches!(result, Err(StatsError::Parse { .. })));
        assert_eq!(fetcher.calls_to(&url("user/withdraw_history")).await, 1);
    }

    #[tokio::test]
    async fn test_detail_parse_error_surfaces_after_settling() {
        let fetcher = scenario().await;
        fetcher
            .page(&url("user/withdraw_stat/B"), "<tr><td>not a date</td><td>x</td><td>1</td></tr>")
            .await;
        let store = MemoryStore::new();
        let mut collector = collector(fetcher, store.clone()).await;

        let result = collector.run().await;

        assert!(matches!(result, Err(StatsError::Parse { .. })));
        // 成功的 A 仍然寫入快取
        assert!(collector.cache().has("withdraw_stat/A"));
        assert!(!collector.cache().has("withdraw_stat/B"));
        assert_eq!(store.writes().await, 1);
    }

    #[tokio::test]
    async fn test_paginated_listing_and_details_are_merged() {
        let fetcher = MockFetcher::new();
        let listing_links = r#"<a href="/user/withdraw_history?page=2">2</a>"#;
        fetcher
            .redirected(
                &url("user/withdraw_history"),
                &url("user/withdraw_history?page=1"),
                &format!("{}{}", withdrawal_row("01.04.2021", "A", "30"), listing_links),
            )
            .await;
        fetcher
            .page(
                &url("user/withdraw_history?page=2"),
                &withdrawal_row("01.03.2021", "B", "5"),
            )
            .await;
        fetcher
            .page(
                &url("user/withdraw_stat/A"),
                &format!(
                    "{}{}",
                    sale_row("20.03.2021", "chair", "20"),
                    r#"<a href="/user/withdraw_stat/A?page=2">2</a>"#
                ),
            )
            .await;
        fetcher
            .page(
                &url("user/withdraw_stat/A?page=2"),
                &format!(
                    "{}{}",
                    sale_row("10.03.2021", "chair", "10"),
                    sale_row("11.03.2021", "lamp", "0")
                ),
            )
            .await;
        fetcher
            .page(&url("user/withdraw_stat/B"), &sale_row("01.02.2021", "lamp", "5"))
            .await;
        fetcher.page(&url("user/income_new"), "<table></table>").await;

        let outcome = collector(fetcher, MemoryStore::new()).await.run().await.unwrap();

        let ids: Vec<&str> = outcome.records.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(ids, vec!["withdraw_stat/B", "withdraw_stat/A", "current"]);

        let a = outcome.records[1].products.as_ref().unwrap();
        let chair: Vec<i64> = a[r#"<a href="/model/chair">chair</a>"#]
            .iter()
            .map(|s| s.time)
            .collect();
        assert_eq!(chair.len(), 2);
        assert!(chair[0] < chair[1]);
        assert_eq!(a.len(), 2);
        assert!(outcome.records[2].products.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_detail_urls() {
        let settings = settings();
        assert_eq!(
            settings.detail_url(&WithdrawalRecord::new("withdraw_stat/x", 0, 0.0)),
            "https://3ddd.test/user/withdraw_stat/x"
        );
        assert_eq!(
            settings.detail_url(&WithdrawalRecord::current(0)),
            "https://3ddd.test/user/income_new"
        );
        assert_eq!(
            settings.withdraw_history_url(),
            "https://3ddd.test/user/withdraw_history"
        );
    }
}
