use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::utils::error::PaymentError;

// HTTP客户端配置
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("PaymentRelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// 渠道原始响应
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

// HTTP客户端日志记录器
#[derive(Debug, Clone)]
pub struct RequestLogger {
    mask_fields: Vec<String>,
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self {
            mask_fields: vec![
                "secret".to_string(),
                "key".to_string(),
                "signature".to_string(),
                "token".to_string(),
                "certificate".to_string(),
            ],
        }
    }
}

impl RequestLogger {
    // 遮蔽敏感字段，非 JSON 内容只保留长度
    pub fn mask_sensitive_data(&self, data: &str) -> String {
        match serde_json::from_str::<Value>(data) {
            Ok(mut json_value) => {
                self.mask_json_value(&mut json_value);
                json_value.to_string()
            }
            Err(_) => format!("<<{} bytes non-json>>", data.len()),
        }
    }

    // 递归遮蔽JSON中的敏感字段
    fn mask_json_value(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key = key.to_lowercase();
                    if self.mask_fields.iter().any(|field| key.contains(field.as_str())) {
                        *val = Value::String("*****".to_string());
                    } else {
                        self.mask_json_value(val);
                    }
                }
            }
            Value::Array(array) => {
                for val in array.iter_mut() {
                    self.mask_json_value(val);
                }
            }
            _ => {}
        }
    }
}

// HTTP客户端，不做任何自动重试
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    logger: RequestLogger,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| PaymentError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            logger: RequestLogger::default(),
        })
    }

    /// 发送 JSON 请求体，返回状态码和原始响应文本
    ///
    /// 请求体不写日志，其中包含签名覆盖的全部内容。
    pub async fn post_json_raw(
        &self,
        url: &str,
        headers: header::HeaderMap,
        body: String,
    ) -> Result<RawResponse, PaymentError> {
        let request_id = Uuid::new_v4().to_string();

        let response = self
            .client
            .post(url)
            .headers(headers)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PaymentError::transport(describe_reqwest_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::transport(describe_reqwest_error(&e)))?;

        debug!(
            request_id = %request_id,
            status = %status.as_u16(),
            response = %self.logger.mask_sensitive_data(&body),
            "HTTP response"
        );

        Ok(RawResponse { status, body })
    }
}

// reqwest 错误里可能带完整 URL，这里只保留类别
fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else if err.is_body() || err.is_decode() {
        "failed to read response body".to_string()
    } else {
        "request failed".to_string()
    }
}
