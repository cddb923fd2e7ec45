use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, StoreError};

/// `POST /customer/stats` 请求体。
///
/// 字段缺省时取零值/空串，交由结构校验统一拒绝（并照常计入 invalid）。
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(default)]
pub struct StatsRequest {
    #[serde(rename = "customerID")]
    #[schema(example = 1)]
    pub customer_id: i64,
    #[serde(rename = "tagID")]
    #[schema(example = 2)]
    pub tag_id: i64,
    #[serde(rename = "userID")]
    #[schema(example = "aaaaaaaa-bbbb-cccc-1111-222222222222")]
    pub user_id: String,
    #[serde(rename = "remoteIP")]
    #[schema(example = "123.234.56.78")]
    pub remote_ip: String,
    /// epoch 秒
    #[schema(example = 1500000000)]
    pub timestamp: i64,
}

/// 一次入站活动事件，接收后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub customer_id: i64,
    pub tag_id: i64,
    pub user_id: String,
    pub remote_ip: String,
    pub timestamp: i64,
    /// 只来自传输层的 `User-Agent` 头
    pub user_agent: Option<String>,
}

impl Event {
    pub fn from_request(req: StatsRequest, user_agent: Option<String>) -> Self {
        Self {
            customer_id: req.customer_id,
            tag_id: req.tag_id,
            user_id: req.user_id,
            remote_ip: req.remote_ip,
            timestamp: req.timestamp,
            user_agent,
        }
    }
}

/// 拒绝原因，决定对外的说明文字与状态码提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// 缺失/为零的字段（对外字段名）
    MissingFields(Vec<&'static str>),
    /// 时间戳非零，但无法落到日历上
    TimestampOutOfRange,
    CustomerNotFound,
    CustomerInactive,
    UserAgentMissing,
    BlacklistedUserAgent,
    BlacklistedIp,
    /// 资格查询本身失败（非“未找到”）
    LookupFailed(StoreError),
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::MissingFields(_) => "missing required fields",
            RejectReason::TimestampOutOfRange => "timestamp out of range",
            RejectReason::CustomerNotFound => "customer not found",
            RejectReason::CustomerInactive => "customer is not active",
            RejectReason::UserAgentMissing => "user agent missing",
            RejectReason::BlacklistedUserAgent => "blacklisted user agent",
            RejectReason::BlacklistedIp => "blacklisted ip",
            RejectReason::LookupFailed(_) => "internal error",
        }
    }

    /// 对外 detail：结构校验失败时附上具体字段
    pub fn detail(&self) -> String {
        match self {
            RejectReason::MissingFields(fields) if !fields.is_empty() => {
                format!("{}: {}", self.message(), fields.join(", "))
            }
            _ => self.message().to_string(),
        }
    }

    pub fn status_hint(&self) -> StatusCode {
        match self {
            RejectReason::LookupFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// 校验流水线的结论：每个事件恰好产生一个
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }
}

/// 一次 `ingest` 的完整结果。
///
/// `record_error` 只供观测，不改变 `outcome` 决定的对外响应。
#[derive(Debug)]
pub struct IngestOutcome {
    pub outcome: ValidationOutcome,
    pub record_error: Option<StoreError>,
    pub hook_error: Option<AppError>,
}

impl IngestOutcome {
    /// 映射为边界结果：接受 -> Ok；校验拒绝 -> 400；查询故障/钩子失败 -> 500。
    pub fn into_result(self) -> Result<(), AppError> {
        if let Some(err) = self.hook_error {
            return Err(err);
        }
        match self.outcome {
            ValidationOutcome::Accepted => Ok(()),
            ValidationOutcome::Rejected(RejectReason::LookupFailed(e)) => Err(AppError::Store(e)),
            ValidationOutcome::Rejected(reason) => Err(AppError::Rejected(reason.detail())),
        }
    }
}

/// `POST /customer/stats` 成功响应
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IngestResponse {
    #[schema(example = true)]
    pub accepted: bool,
}
