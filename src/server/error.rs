use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

/// API错误类型
pub enum ApiError {
    /// 请求参数错误，直接返回 400 和可读信息
    BadRequest(String),
    /// 搜索后端未初始化，返回 503，和一般失败区分开
    Unavailable(String),
    /// 上游调用失败，返回 500，消息指明失败的步骤但不泄漏内部细节
    Failed(String),
    /// 其他内部错误，细节只进日志
    Internal(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Failed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Internal(err) => {
                error!("内部错误: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
