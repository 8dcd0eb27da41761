pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::toml_config::TomlConfig;

pub use adapters::{LocalStorage, ReqwestFetcher, StorageSlot};
pub use core::{
    cache::PersistentCache,
    collector::{CollectionOutcome, Collector, CollectorSettings, EventSink},
    engine::{RunSummary, StatsEngine},
    report::Period,
    retry::RetryPolicy,
};
pub use domain::ports::SystemClock;
pub use utils::error::{Result, StatsError};
