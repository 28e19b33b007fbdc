use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{CheckoutSession, PaymentProvider};
use crate::config::{GoodsConfig, ProviderConfig, Secret};
use crate::domain::entities::PaymentOrderRecord;
use crate::utils::crypto::{NonceGenerator, sign_payload};
use crate::utils::error::PaymentError;
use crate::utils::http_client::{HttpClient, HttpClientConfig, RawResponse};

pub const HEADER_TIMESTAMP: &str = "BinancePay-Timestamp";
pub const HEADER_CERTIFICATE_SN: &str = "BinancePay-Certificate-SN";
pub const HEADER_SIGNATURE: &str = "BinancePay-Signature";

const PRODUCT_TYPE: &str = "Payment";
const STATUS_SUCCESS: &str = "SUCCESS";

// 字段顺序即序列化顺序，签名依赖这一点
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderPayload<'a> {
    merchant_trade_no: &'a str,
    total_amount: String,
    currency: &'a str,
    product_type: &'a str,
    goods: GoodsPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoodsPayload<'a> {
    goods_type: &'a str,
    goods_category: &'a str,
    reference_goods_id: &'a str,
    goods_name: &'a str,
    goods_detail: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    status: String,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    data: Option<OrderResponseData>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponseData {
    #[serde(default)]
    prepay_id: Option<String>,
    #[serde(default)]
    checkout_url: Option<String>,
    #[serde(default)]
    qr_content: Option<String>,
}

/// 已签名的请求
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub body: String,
    pub nonce: String,
    pub signature: String,
}

/// Binance Pay 下单适配器
pub struct BinancePayAdapter {
    order_url: String,
    certificate_sn: Secret,
    secret_key: Secret,
    goods: GoodsConfig,
    client: HttpClient,
    nonces: NonceGenerator,
}

impl BinancePayAdapter {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, PaymentError> {
        let client = HttpClient::new(HttpClientConfig {
            timeout,
            user_agent: config.user_agent.clone(),
            ..HttpClientConfig::default()
        })?;

        Ok(Self {
            order_url: config.order_url(),
            certificate_sn: config.certificate_sn.clone(),
            secret_key: config.secret_key.clone(),
            goods: config.goods.clone(),
            client,
            nonces: NonceGenerator::new(),
        })
    }

    /// 订单的规范 JSON
    pub fn canonical_payload(&self, order: &PaymentOrderRecord) -> Result<String, PaymentError> {
        let payload = OrderPayload {
            merchant_trade_no: &order.merchant_trade_no,
            total_amount: order.terms.amount_text(),
            currency: &order.terms.currency,
            product_type: PRODUCT_TYPE,
            goods: GoodsPayload {
                goods_type: &self.goods.goods_type,
                goods_category: &self.goods.goods_category,
                reference_goods_id: &self.goods.reference_goods_id,
                goods_name: &self.goods.goods_name,
                goods_detail: &self.goods.goods_detail,
            },
        };

        serde_json::to_string(&payload)
            .map_err(|e| PaymentError::Internal(format!("failed to serialize payload: {}", e)))
    }

    /// 用给定 nonce 签名
    pub fn sign_with_nonce(
        &self,
        order: &PaymentOrderRecord,
        nonce: u64,
    ) -> Result<SignedRequest, PaymentError> {
        let body = self.canonical_payload(order)?;
        let nonce = nonce.to_string();
        let signature = sign_payload(&body, &nonce, self.secret_key.expose())?;

        Ok(SignedRequest {
            body,
            nonce,
            signature,
        })
    }

    fn headers(&self, request: &SignedRequest) -> Result<HeaderMap, PaymentError> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (HEADER_TIMESTAMP, request.nonce.as_str()),
            (HEADER_CERTIFICATE_SN, self.certificate_sn.expose()),
            (HEADER_SIGNATURE, request.signature.as_str()),
        ] {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| PaymentError::Internal(format!("invalid header name {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| PaymentError::Internal(format!("invalid value for header {}", name)))?;
            headers.insert(header, value);
        }
        Ok(headers)
    }
}

/// 将渠道响应映射为下单结果
fn parse_response(raw: &RawResponse) -> Result<CheckoutSession, PaymentError> {
    let response: OrderResponse = serde_json::from_str(&raw.body).map_err(|_| {
        PaymentError::transport(format!(
            "malformed provider response (HTTP {})",
            raw.status.as_u16()
        ))
    })?;

    if response.status != STATUS_SUCCESS {
        let code = match response.code {
            Some(Value::String(code)) => code,
            Some(other) => other.to_string(),
            None => format!("HTTP {}", raw.status.as_u16()),
        };
        let message = response
            .error_message
            .unwrap_or_else(|| format!("provider status {}", response.status));
        return Err(PaymentError::provider_rejected(code, message));
    }

    if !raw.status.is_success() {
        return Err(PaymentError::transport(format!(
            "provider reported success with HTTP {}",
            raw.status.as_u16()
        )));
    }

    let data = response
        .data
        .ok_or_else(|| PaymentError::transport("success response without data"))?;
    let pay_url = data
        .checkout_url
        .or(data.qr_content)
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| PaymentError::transport("success response without checkout url"))?;

    Ok(CheckoutSession {
        pay_url,
        provider_order_id: data.prepay_id,
    })
}

#[async_trait]
impl PaymentProvider for BinancePayAdapter {
    fn name(&self) -> &'static str {
        "binance_pay"
    }

    async fn create_order(&self, order: &PaymentOrderRecord) -> Result<CheckoutSession, PaymentError> {
        let request = self.sign_with_nonce(order, self.nonces.next())?;
        let headers = self.headers(&request)?;

        debug!(
            merchant_trade_no = %order.merchant_trade_no,
            nonce = %request.nonce,
            "Sending signed order to Binance Pay"
        );

        let raw = self
            .client
            .post_json_raw(&self.order_url, headers, request.body)
            .await?;
        let session = parse_response(&raw)?;

        info!(
            merchant_trade_no = %order.merchant_trade_no,
            prepay_id = session.provider_order_id.as_deref().unwrap_or("-"),
            "Binance Pay order created"
        );

        Ok(session)
    }
}
