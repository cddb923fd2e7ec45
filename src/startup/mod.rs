/// SQLite 连接池与表结构初始化
pub mod database;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::counters::{HourBucketing, SqliteCounterStore};
use crate::features::eligibility::SqliteEligibilityStore;
use crate::features::ingest::IngestionService;
use crate::features::stats::DayAggregator;
use crate::state::AppState;

pub use database::connect_sqlite;

/// 执行启动流程：解析参考时区、连接存储、建表并组装共享状态
pub async fn init_app_state(config: &AppConfig) -> Result<AppState, AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    let bucketing = HourBucketing::from_timezone_name(&config.buckets.timezone)
        .map_err(AppError::Internal)?;
    tracing::info!("✅ 分桶参考时区: {}", bucketing.timezone());

    let pool = connect_sqlite(&config.store).await?;

    let eligibility = SqliteEligibilityStore::new(pool.clone());
    eligibility.init_schema().await?;
    let counters = SqliteCounterStore::new(pool.clone(), bucketing)
        .with_retry_policy(config.store.max_retries, config.store.retry_backoff());
    counters.init_schema().await?;
    tracing::info!("✅ 存储就绪: {}", config.store.sqlite_path);

    let eligibility = Arc::new(eligibility);
    let counters = Arc::new(counters);
    let ingestion = IngestionService::new(eligibility.clone(), counters.clone());
    let day_stats = DayAggregator::new(eligibility, counters, bucketing);

    tracing::info!("✅ 启动检查完成");
    Ok(AppState {
        ingestion: Arc::new(ingestion),
        day_stats: Arc::new(day_stats),
        pool,
    })
}
