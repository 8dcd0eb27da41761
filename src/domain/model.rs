use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 合成記錄的 identity：尚未提領的當期收入
pub const CURRENT_IDENTITY: &str = "current";

/// 商品鍵：原樣保留標記中的錨點字串
pub type ProductKey = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub time: i64,
    pub amount: f64,
}

/// 一次提領，以及（第二階段之後）構成它的所有銷售
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    #[serde(alias = "query")]
    pub identity: String,
    pub time: i64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<BTreeMap<ProductKey, Vec<SaleEvent>>>,
}

impl WithdrawalRecord {
    pub fn new(identity: impl Into<String>, time: i64, amount: f64) -> Self {
        Self {
            identity: identity.into(),
            time,
            amount,
            products: None,
        }
    }

    pub fn current(now: i64) -> Self {
        Self::new(CURRENT_IDENTITY, now, 0.0)
    }

    pub fn is_current(&self) -> bool {
        self.identity == CURRENT_IDENTITY
    }

    pub fn is_resolved(&self) -> bool {
        self.products.is_some()
    }

    /// 每個商品內的銷售依時間遞增
    pub fn sort_sales(&mut self) {
        if let Some(products) = self.products.as_mut() {
            for sales in products.values_mut() {
                sales.sort_by_key(|sale| sale.time);
            }
        }
    }
}

/// 一個可被取得的頁面：跟隨重新導向後的 URL 與內容
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub key: ProductKey,
    pub name: String,
    pub sales: usize,
    pub income: f64,
    pub first_sale: Option<i64>,
    pub last_sale: Option<i64>,
}

/// 收集器對外發出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorEvent {
    /// `total` 為第二階段的任務數，包含快取命中與當期收入 (`current`)
    Progress { completed: usize, total: usize },
    Warning { message: String },
    Finished { last_update: Option<i64> },
    Failed { message: String },
}
