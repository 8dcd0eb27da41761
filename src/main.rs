use clap::Parser;
use std::path::Path;
use tokio::sync::mpsc::UnboundedReceiver;
use withdraw_stats::domain::model::CollectorEvent;
use withdraw_stats::domain::ports::{ConfigProvider, KeyValueStore};
use withdraw_stats::utils::{logger, validation::Validate};
use withdraw_stats::{
    CliConfig, Collector, CollectorSettings, EventSink, LocalStorage, PersistentCache, Period,
    ReqwestFetcher, RunSummary, StatsEngine, StatsError, StorageSlot, SystemClock, TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.log_json);

    tracing::info!("Starting withdraw-stats");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let result = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TomlConfig::from_file(path) {
                Ok(config) => execute(&config, &cli).await,
                Err(e) => Err(e),
            }
        }
        None => execute(&cli, &cli).await,
    };

    match result {
        Ok(Some(summary)) => {
            tracing::info!(
                "✅ {} withdrawals, {} products{}",
                summary.withdrawals,
                summary.products,
                if summary.offline { " (offline)" } else { "" }
            );
            if !summary.failed.is_empty() {
                tracing::warn!("⚠️ Missing withdrawals: {}", summary.failed.join(", "));
            }
            println!("✅ Collected {} withdrawals", summary.withdrawals);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn execute<P>(config: &P, cli: &CliConfig) -> Result<Option<RunSummary>, StatsError>
where
    P: ConfigProvider + Validate,
{
    config.validate()?;

    let slot = cache_slot(config.cache_file())?;

    if cli.clear_cache {
        match PersistentCache::load(slot.clone()).await {
            Ok(cache) => cache.clear().await?,
            // 壞掉的快取也一併刪除
            Err(_) => slot.delete().await?,
        }
        tracing::info!("🗑️ Cache {} cleared", config.cache_file());
        println!("🗑️ Cache cleared");
        return Ok(None);
    }

    let cache = PersistentCache::load(slot).await?;
    let fetcher = ReqwestFetcher::from_config(config)?;

    let (events, rx) = EventSink::channel();
    let reporter = tokio::spawn(report_progress(rx));

    let collector = Collector::new(
        fetcher,
        cache,
        SystemClock,
        CollectorSettings::from_config(config),
    )
    .with_events(events);

    let (from, upto) = config.period();
    let mut engine = StatsEngine::new_with_monitoring(
        collector,
        LocalStorage::new(config.output_path()),
        Period { from, upto },
        cli.monitor,
    );

    let result = engine.run().await;

    // 關閉事件通道，讓 reporter 結束
    drop(engine);
    let _ = reporter.await;

    if result.is_ok() {
        tracing::info!("📁 Output saved to: {}", config.output_path());
    }
    result.map(Some)
}

fn cache_slot(cache_file: &str) -> Result<StorageSlot<LocalStorage>, StatsError> {
    let path = Path::new(cache_file);
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StatsError::InvalidConfigValue {
            field: "cache_file".to_string(),
            value: cache_file.to_string(),
            reason: "must name a file".to_string(),
        })?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(StorageSlot::new(LocalStorage::new(dir), name))
}

async fn report_progress(mut rx: UnboundedReceiver<CollectorEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            CollectorEvent::Progress { completed, total } => {
                let percent = if total > 0 {
                    100.0 * completed as f64 / total as f64
                } else {
                    100.0
                };
                tracing::info!("⏳ Parsing income {}/{} ({:.0}%)", completed, total, percent);
            }
            CollectorEvent::Warning { message } => tracing::warn!("⚠️ {}", message),
            CollectorEvent::Finished { last_update } => {
                let time = last_update.and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis);
                if let Some(time) = time {
                    tracing::info!("🕒 Last update {}", time.format("%d %b %Y %H:%M"));
                }
            }
            CollectorEvent::Failed { message } => tracing::error!("❌ {}", message),
        }
    }
}
