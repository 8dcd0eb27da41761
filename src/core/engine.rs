use crate::core::collector::{CollectionOutcome, Collector};
use crate::core::report::{merge_products, summarize, Period};
use crate::domain::ports::{Clock, KeyValueStore, PageFetcher, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub const WITHDRAWALS_FILE: &str = "withdrawals.json";
pub const PRODUCTS_FILE: &str = "products.json";

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub withdrawals: usize,
    pub products: usize,
    pub failed: Vec<String>,
    pub offline: bool,
    pub last_update: Option<i64>,
}

/// 跑一次收集，再把結果交給輸出儲存
pub struct StatsEngine<F, S, C, O>
where
    F: PageFetcher,
    S: KeyValueStore,
    C: Clock,
    O: Storage,
{
    collector: Collector<F, S, C>,
    output: O,
    period: Period,
    monitor: SystemMonitor,
}

impl<F, S, C, O> StatsEngine<F, S, C, O>
where
    F: PageFetcher,
    S: KeyValueStore,
    C: Clock,
    O: Storage,
{
    pub fn new(collector: Collector<F, S, C>, output: O, period: Period) -> Self {
        Self::new_with_monitoring(collector, output, period, false)
    }

    pub fn new_with_monitoring(
        collector: Collector<F, S, C>,
        output: O,
        period: Period,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            collector,
            output,
            period,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        self.monitor.log_stats("Start");

        let outcome = self.collector.run().await?;
        self.monitor.log_stats("Collected");

        let summary = self.load(&outcome).await?;
        self.monitor.log_final_stats();
        Ok(summary)
    }

    async fn load(&self, outcome: &CollectionOutcome) -> Result<RunSummary> {
        let products = merge_products(&outcome.records);
        let summaries = summarize(&products, self.period);

        tracing::debug!(
            "Writing {} withdrawals and {} product summaries",
            outcome.records.len(),
            summaries.len()
        );
        self.output
            .write_file(WITHDRAWALS_FILE, &serde_json::to_vec_pretty(&outcome.records)?)
            .await?;
        self.output
            .write_file(PRODUCTS_FILE, &serde_json::to_vec_pretty(&summaries)?)
            .await?;

        Ok(RunSummary {
            withdrawals: outcome.records.len(),
            products: summaries.len(),
            failed: outcome.failed.clone(),
            offline: outcome.offline,
            last_update: outcome.last_update(),
        })
    }
}
