use crate::domain::model::WithdrawalRecord;
use crate::domain::ports::KeyValueStore;
use crate::utils::error::{Result, StatsError};
use std::collections::BTreeMap;

/// 以 identity 為鍵的提領快取，啟動時載入一次，只在有變更時寫回。
pub struct PersistentCache<S: KeyValueStore> {
    store: S,
    data: BTreeMap<String, WithdrawalRecord>,
    dirty: bool,
}

impl<S: KeyValueStore> PersistentCache<S> {
    pub async fn load(store: S) -> Result<Self> {
        let raw = store.read().await.map_err(|e| StatsError::CacheUnavailable {
            reason: format!("cannot read cache store: {}", e),
        })?;

        let data = match raw {
            Some(bytes) if !bytes.is_empty() => {
                serde_json::from_slice(&bytes).map_err(|e| StatsError::CacheUnavailable {
                    reason: format!("cache content is not valid: {}", e),
                })?
            }
            _ => BTreeMap::new(),
        };

        tracing::debug!("💾 Loaded {} cached withdrawals", data.len());

        Ok(Self {
            store,
            data,
            dirty: false,
        })
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&WithdrawalRecord> {
        self.data.get(key)
    }

    /// 只標記為 dirty，不立即寫入
    pub fn set(&mut self, key: impl Into<String>, value: WithdrawalRecord) {
        self.data.insert(key.into(), value);
        self.dirty = true;
    }

    /// 有未保存的變更時整份寫回；回傳是否真的寫入
    pub async fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        let bytes = serde_json::to_vec(&self.data)?;
        self.store.write(&bytes).await?;
        self.dirty = false;

        tracing::debug!(
            "💾 Saved {} cached withdrawals ({} bytes)",
            self.data.len(),
            bytes.len()
        );
        Ok(true)
    }

    /// 所有快取值的獨立複本（離線模式用）
    pub fn snapshot(&self) -> Vec<WithdrawalRecord> {
        self.data.values().cloned().collect()
    }

    /// 刪除持久儲存；記憶體內容不動，呼叫後應重新啟動
    pub async fn clear(&self) -> Result<()> {
        self.store.delete().await
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{resolved, MemoryStore};

    #[tokio::test]
    async fn test_empty_store_loads_empty_cache() {
        let cache = PersistentCache::load(MemoryStore::new()).await.unwrap();
        assert!(cache.is_empty());
        assert!(!cache.has("withdraw_stat/a"));
        assert!(cache.get("withdraw_stat/a").is_none());
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let store = MemoryStore::new();
        let record = resolved("withdraw_stat/a", 1_000, 10.0, &[("<a>Chair</a>", 900, 10.0)]);

        let mut cache = PersistentCache::load(store.clone()).await.unwrap();
        cache.set("withdraw_stat/a", record.clone());
        assert!(cache.save().await.unwrap());

        let reloaded = PersistentCache::load(store).await.unwrap();
        assert!(reloaded.has("withdraw_stat/a"));
        assert_eq!(reloaded.get("withdraw_stat/a"), Some(&record));
    }

    #[tokio::test]
    async fn test_save_writes_only_when_dirty() {
        let store = MemoryStore::new();
        let mut cache = PersistentCache::load(store.clone()).await.unwrap();

        assert!(!cache.save().await.unwrap());
        assert_eq!(store.writes().await, 0);

        cache.set("withdraw_stat/a", resolved("withdraw_stat/a", 1, 1.0, &[]));
        assert!(cache.is_dirty());
        assert!(tokio_test::assert_ok!(cache.save().await));
        assert!(!tokio_test::assert_ok!(cache.save().await));
        assert_eq!(store.writes().await, 1);
        assert!(!cache.is_dirty());
    }

    #[tokio::test]
    async fn test_snapshot_is_independent_copy() {
        let mut cache = PersistentCache::load(MemoryStore::new()).await.unwrap();
        cache.set("withdraw_stat/a", resolved("withdraw_stat/a", 1, 1.0, &[("p", 1, 1.0)]));

        let mut snapshot = cache.snapshot();
        snapshot[0].amount = 999.0;
        snapshot[0].products = None;

        let cached = cache.get("withdraw_stat/a").unwrap();
        assert_eq!(cached.amount, 1.0);
        assert!(cached.is_resolved());
    }

    #[tokio::test]
    async fn test_clear_removes_durable_store() {
        let store = MemoryStore::new();
        let mut cache = PersistentCache::load(store.clone()).await.unwrap();
        cache.set("withdraw_stat/a", resolved("withdraw_stat/a", 1, 1.0, &[]));
        tokio_test::assert_ok!(cache.save().await);

        tokio_test::assert_ok!(cache.clear().await);
        assert!(store.contents().await.is_none());

        let reloaded = PersistentCache::load(store).await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_store_is_reported() {
        let store = MemoryStore::with_contents(b"{not json".to_vec());
        let result = PersistentCache::load(store).await;
        assert!(matches!(result, Err(StatsError::CacheUnavailable { .. })));
    }
}
