use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::{Modify, OpenApi};

/// 为 Swagger UI 提供“业务接口前缀”Servers 配置。
///
/// 业务接口挂在 `config.api.prefix`（默认为空，即根路径）下，`/health` 始终不带前缀。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("业务接口"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/")
                    .description(Some("业务接口前缀：对应 config.api.prefix（APP_API__PREFIX）")),
            )
            .build();

        openapi.servers = Some(vec![api]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::ingest::handler::post_customer_stats,
        crate::features::stats::handler::get_customer_day_stats,
    ),
    components(
        schemas(
            crate::error::AppError,
            crate::error::StoreError,
            crate::error::ProblemDetails,
            crate::features::health::handler::HealthResponse,
            crate::features::ingest::models::StatsRequest,
            crate::features::ingest::models::IngestResponse,
            crate::features::stats::models::CustomerHourStatistics,
            crate::features::stats::models::CustomerDayStatistics,
        )
    ),
    modifiers(&ApiServers),
    tags(
        (
            name = "Stats",
            description = "客户活动事件上报（校验 + 小时计数）与按日统计查询。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Customer Stats API",
        version = env!("CARGO_PKG_VERSION"),
        description = "客户活动事件校验与小时计数服务（Axum + utoipa）。"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_lists_both_stats_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/customer/stats"));
        assert!(
            paths
                .iter()
                .any(|p| p.as_str() == "/customer/stats/{customer_id}/day/{day}")
        );
    }
}
