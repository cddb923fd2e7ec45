use std::sync::Arc;

use sqlx::SqlitePool;

use crate::features::ingest::service::IngestionService;
use crate::features::stats::aggregator::DayAggregator;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 事件入站编排（校验 + 计数）
    pub ingestion: Arc<IngestionService>,
    /// 按日聚合查询
    pub day_stats: Arc<DayAggregator>,
    /// 共享连接池（健康检查使用）
    pub pool: SqlitePool,
}
