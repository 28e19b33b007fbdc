use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// API响应结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "0".to_string(),
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

// 业务错误代码枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // 系统错误 (1xxx)
    InternalServerError = 1000,

    // 请求错误 (3xxx)
    InvalidParameters = 3001,
    ResourceNotFound = 3002,

    // 业务错误 (4xxx)
    InvalidAmount = 4010,
    RequestInFlight = 4011,
    AttemptsExhausted = 4012,
    IdempotencyConflict = 4013,

    // 第三方服务错误 (5xxx)
    ChannelRejected = 5002,
    ChannelTransportFailure = 5004,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalServerError => "Internal server error",
            Self::InvalidParameters => "Invalid parameters",
            Self::ResourceNotFound => "Resource not found",
            Self::InvalidAmount => "Invalid amount",
            Self::RequestInFlight => "Request in flight",
            Self::AttemptsExhausted => "Attempts exhausted",
            Self::IdempotencyConflict => "Idempotency conflict",
            Self::ChannelRejected => "Channel rejected",
            Self::ChannelTransportFailure => "Channel transport failure",
        }
    }

    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    pub fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidParameters => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::InvalidAmount => StatusCode::BAD_REQUEST,
            Self::RequestInFlight => StatusCode::CONFLICT,
            Self::AttemptsExhausted => StatusCode::CONFLICT,
            Self::IdempotencyConflict => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ChannelRejected => StatusCode::BAD_GATEWAY,
            Self::ChannelTransportFailure => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 支付中继错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Order {merchant_trade_no} is already in flight")]
    RequestInFlight { merchant_trade_no: String },

    #[error("Order {merchant_trade_no} exhausted {attempts} attempts")]
    AttemptsExhausted {
        merchant_trade_no: String,
        attempts: u32,
    },

    #[error("Idempotency key reused with different order terms: {0}")]
    IdempotencyConflict(String),

    #[error("Provider rejected the order: {code}, {message}")]
    ProviderRejected { code: String, message: String },

    #[error("Provider transport failure: {0}")]
    TransportFailure(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn provider_rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderRejected {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidAmount(_) => ErrorCode::InvalidAmount,
            Self::InvalidRequest(_) => ErrorCode::InvalidParameters,
            Self::RequestInFlight { .. } => ErrorCode::RequestInFlight,
            Self::AttemptsExhausted { .. } => ErrorCode::AttemptsExhausted,
            Self::IdempotencyConflict(_) => ErrorCode::IdempotencyConflict,
            Self::ProviderRejected { .. } => ErrorCode::ChannelRejected,
            Self::TransportFailure(_) => ErrorCode::ChannelTransportFailure,
            Self::NotFound(_) => ErrorCode::ResourceNotFound,
            Self::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    // 获取错误对应的HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        self.code().as_status_code()
    }

    /// 调用方是否可以用同一个幂等键重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestInFlight { .. } | Self::ProviderRejected { .. } | Self::TransportFailure(_)
        )
    }

    // 获取用户友好的错误消息，渠道细节只写日志
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidAmount(msg) => format!("Invalid amount: {}", msg),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::RequestInFlight { .. } => {
                "Payment is being processed, please retry shortly.".to_string()
            }
            Self::AttemptsExhausted { .. } => {
                "Too many payment attempts for this checkout, please start a new one.".to_string()
            }
            Self::IdempotencyConflict(_) => {
                "Idempotency key was already used for a different order.".to_string()
            }
            Self::ProviderRejected { code, message } => {
                warn!(provider_code = %code, provider_message = %message, "Provider rejected order");
                "The payment provider declined the order.".to_string()
            }
            Self::TransportFailure(msg) => {
                warn!(error = %msg, "Provider transport failure");
                "The payment provider is unavailable, please retry.".to_string()
            }
            Self::NotFound(msg) => msg.clone(),
            Self::Internal(msg) => {
                error!("Internal error: {}", msg);
                "An internal error occurred. Please try again later.".to_string()
            }
        }
    }
}

// 将PaymentError转换为Axum响应
impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().as_u16().to_string();
        let message = self.user_message();

        if status.is_server_error() {
            error!(
                status_code = %status.as_u16(),
                error_code = %code,
                error_message = %message,
                "Server error occurred"
            );
        }

        (status, Json(ApiResponse::<()>::error(&code, &message))).into_response()
    }
}

impl From<JsonRejection> for PaymentError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for PaymentError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("relay task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_api_response() {
        let success = ApiResponse::success("test data");
        assert!(success.success);
        assert_eq!(success.code, "0");
        assert_eq!(success.data, Some("test data"));

        let error = ApiResponse::<String>::error("4010", "Invalid amount");
        assert!(!error.success);
        assert_eq!(error.code, "4010");
        assert_eq!(error.data, None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PaymentError::InvalidAmount("-5".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PaymentError::InvalidRequest("empty key".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PaymentError::RequestInFlight { merchant_trade_no: "abc".into() }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PaymentError::provider_rejected("400201", "bad goods").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PaymentError::transport("timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PaymentError::IdempotencyConflict("k".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_retryable() {
        assert!(PaymentError::transport("reset").is_retryable());
        assert!(PaymentError::provider_rejected("1", "x").is_retryable());
        assert!(!PaymentError::InvalidAmount("0".into()).is_retryable());
        assert!(
            !PaymentError::AttemptsExhausted { merchant_trade_no: "a".into(), attempts: 3 }
                .is_retryable()
        );
    }

    #[tokio::test]
    async fn test_provider_detail_not_in_response_body() {
        let response =
            PaymentError::provider_rejected("400002", "signature for merchant 42 mismatch")
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "5002");
        assert!(!body["message"].as_str().unwrap().contains("merchant 42"));
    }
}
