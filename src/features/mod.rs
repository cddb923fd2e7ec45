/// 只读资格查询（客户状态 / IP 与 UA 黑名单）
pub mod eligibility;

/// 小时计数存储与分桶
pub mod counters;

/// 事件校验与入站编排
pub mod ingest;

/// 按日聚合查询
pub mod stats;

/// 健康检查
pub mod health;

use axum::Router;

use crate::state::AppState;

/// 业务路由（不含 /health 与文档），由调用方决定挂载前缀
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(ingest::create_ingest_router())
        .merge(stats::create_stats_router())
}
