pub mod cache;
pub mod collector;
pub mod decode;
pub mod engine;
pub mod extract;
pub mod pagination;
pub mod report;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{CollectorEvent, FetchedPage, SaleEvent, WithdrawalRecord};
pub use crate::domain::ports::{Clock, ConfigProvider, KeyValueStore, PageFetcher, Storage};
pub use crate::utils::error::Result;
