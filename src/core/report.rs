use crate::domain::model::{ProductKey, ProductSummary, SaleEvent, WithdrawalRecord};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const DAY_MILLIS: i64 = 86_400_000;

static DISPLAY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">(.*?)<").expect("display name pattern"));

/// 報表期間，兩端皆含，以日為單位比較
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    pub from: Option<i64>,
    pub upto: Option<i64>,
}

impl Period {
    pub fn contains(&self, time: i64) -> bool {
        let day = time.div_euclid(DAY_MILLIS);
        self.from.map_or(true, |from| day >= from.div_euclid(DAY_MILLIS))
            && self.upto.map_or(true, |upto| day <= upto.div_euclid(DAY_MILLIS))
    }
}

/// 合併所有提領的商品銷售；每個商品內依時間排序
pub fn merge_products(records: &[WithdrawalRecord]) -> BTreeMap<ProductKey, Vec<SaleEvent>> {
    let mut products: BTreeMap<ProductKey, Vec<SaleEvent>> = BTreeMap::new();
    for record in records {
        let Some(sales) = &record.products else {
            continue;
        };
        for (key, events) in sales {
            products.entry(key.clone()).or_default().extend(events.iter().cloned());
        }
    }
    for events in products.values_mut() {
        events.sort_by_key(|sale| sale.time);
    }
    products
}

/// 錨點中第一段 `>…<` 的文字；找不到時用整個鍵
pub fn display_name(key: &str) -> String {
    DISPLAY_NAME
        .captures(key)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| key.to_string())
}

/// 每個商品在期間內的銷售次數與收入；期間內沒有銷售的商品不列出
pub fn summarize(
    products: &BTreeMap<ProductKey, Vec<SaleEvent>>,
    period: Period,
) -> Vec<ProductSummary> {
    products
        .iter()
        .filter_map(|(key, events)| {
            let sales: Vec<&SaleEvent> = events.iter().filter(|s| period.contains(s.time)).collect();
            if sales.is_empty() {
                return None;
            }
            Some(ProductSummary {
                key: key.clone(),
                name: display_name(key),
                sales: sales.len(),
                income: sales.iter().map(|s| s.amount).sum(),
                first_sale: sales.iter().map(|s| s.time).min(),
                last_sale: sales.iter().map(|s| s.time).max(),
            })
        })
        .collect()
}
