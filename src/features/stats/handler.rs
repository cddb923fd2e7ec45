use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::get,
};

use crate::error::AppError;
use crate::state::AppState;

use super::models::CustomerDayStatistics;

fn parse_i64_param(name: &str, raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| AppError::Validation(format!("{name} 必须是整数: {e}")))
}

#[utoipa::path(
    get,
    path = "/customer/stats/{customer_id}/day/{day}",
    summary = "客户某日的小时统计",
    description = "day 为目标自然日（参考时区）内任意时刻的 epoch 秒。返回当日每个小时的有效/无效请求数（按时间升序）与全天总请求数；当日无活动时返回空列表与 0。",
    params(
        ("customer_id" = i64, Path, description = "客户 ID"),
        ("day" = i64, Path, description = "目标日内任意时刻（epoch 秒）")
    ),
    responses(
        (status = 200, description = "当日统计", body = CustomerDayStatistics),
        (
            status = 400,
            description = "参数不是整数/客户不存在",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 500,
            description = "存储查询失败",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    tag = "Stats"
)]
pub async fn get_customer_day_stats(
    State(state): State<AppState>,
    Path((customer_id, day)): Path<(String, String)>,
) -> Result<Json<CustomerDayStatistics>, AppError> {
    let customer_id = parse_i64_param("customerID", &customer_id)?;
    let day = parse_i64_param("day", &day)?;

    let summary = state.day_stats.get_day_statistics(customer_id, day).await?;
    Ok(Json(summary.into()))
}

pub fn create_stats_router() -> Router<AppState> {
    Router::new().route(
        "/customer/stats/:customer_id/day/:day",
        get(get_customer_day_stats),
    )
}
