use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::Json,
};

use crate::error::AppError;
use crate::state::AppState;

use super::models::{Event, IngestResponse, StatsRequest};

#[utoipa::path(
    post,
    path = "/customer/stats",
    summary = "上报一次客户活动事件",
    description = "依次执行结构校验、客户资格、User-Agent 存在性、User-Agent 黑名单、IP 黑名单检查。\n\n无论接受与否，事件都会计入其自身时间戳所在小时的计数桶（接受计 valid，拒绝计 invalid）。",
    request_body = StatsRequest,
    params(("User-Agent" = String, Header, description = "调用方 User-Agent（必填）")),
    responses(
        (status = 200, description = "事件被接受", body = IngestResponse),
        (
            status = 400,
            description = "事件被拒绝（缺少字段/客户不存在或未启用/User-Agent 缺失或在黑名单/IP 在黑名单）",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 500,
            description = "资格查询失败等基础设施故障",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    tag = "Stats"
)]
pub async fn post_customer_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError> {
    let req: StatsRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Json(format!("请求体无效: {e}")))?;
    // 非 UTF-8 的 User-Agent 仍视为存在，照常参与黑名单比对
    let user_agent = headers
        .get(header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let event = Event::from_request(req, user_agent);
    state.ingestion.ingest(&event).await.into_result()?;

    Ok(Json(IngestResponse { accepted: true }))
}
