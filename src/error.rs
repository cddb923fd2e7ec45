use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型（HTTP 边界）
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 请求体无法解析为约定的 JSON 结构
    #[error("JSON 解析错误: {0}")]
    Json(String),

    /// 路径/查询参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// 事件被校验流水线拒绝（结构/资格/黑名单）
    #[error("{0}")]
    Rejected(String),

    /// 客户不存在
    #[error("customer not found: {0}")]
    CustomerNotFound(i64),

    /// 计数/资格存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 存储层错误类型（计数存储与资格存储共用）
#[derive(Error, Debug, Clone, PartialEq, Eq, utoipa::ToSchema)]
pub enum StoreError {
    /// 普通数据库错误（连接、SQL 执行等）
    #[error("数据库错误: {0}")]
    Database(String),

    /// 瞬时冲突在重试上限内仍未恢复
    #[error("事务冲突（已尝试 {attempts} 次）: {message}")]
    Conflict { attempts: u32, message: String },

    /// 时间戳无法在参考时区中表示
    #[error("时间戳超出可表示范围: {0}")]
    TimestampOutOfRange(i64),

    /// 单键更新影响了多于一行：唯一性约束已在本子系统之外被破坏
    #[error("一致性约束被破坏: {0}")]
    InvariantViolation(String),
}

impl StoreError {
    /// 是否为致命类错误（需要运维介入，而不是简单重试）
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::InvariantViolation(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 所有 API 错误都以结构化 JSON 返回，content-type 为 application/problem+json。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Bad Request")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 400)]
    pub status: u16,

    /// 人类可读的详细信息（拒绝原因等）。
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "blacklisted ip")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "REJECTED")]
    pub code: String,

    /// 请求追踪 ID（由 request-id 中间件注入）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::CustomerNotFound(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::Json(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Rejected(_) => "REJECTED",
            AppError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            AppError::Store(e) => match e {
                StoreError::InvariantViolation(_) => "INVARIANT_VIOLATION",
                StoreError::Conflict { .. } => "STORE_CONFLICT",
                StoreError::Database(_) | StoreError::TimestampOutOfRange(_) => "STORE_ERROR",
            },
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 服务端错误统一落一条 error 日志；拒绝类属于业务结果，由调用方按需记录。
        if status.is_server_error() {
            tracing::error!(code = self.stable_code(), "请求失败: {}", self);
        }

        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, StoreError};
    use axum::http::StatusCode;

    #[test]
    fn invariant_violation_is_fatal_and_maps_to_500() {
        let err = StoreError::InvariantViolation("2 rows affected".into());
        assert!(err.is_fatal());
        assert!(!StoreError::Database("io".into()).is_fatal());

        let app: AppError = err.into();
        assert_eq!(app.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.stable_code(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn rejection_keeps_reason_as_detail() {
        let err = AppError::Rejected("blacklisted ip".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "blacklisted ip");
    }
}
