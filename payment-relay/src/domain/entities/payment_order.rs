use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::enums::OrderStatus;
use crate::utils::crypto::derive_merchant_trade_no;
use crate::utils::error::PaymentError;

pub const DEFAULT_CURRENCY: &str = "USD";
/// 幂等键最大字节数
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// 店铺前端提交的下单请求
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderRequest {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub idempotency_key: String,
}

impl PaymentOrderRequest {
    pub fn new(amount: f64, currency: Option<&str>, idempotency_key: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            currency: currency.map(str::to_string),
            idempotency_key: idempotency_key.into(),
        }
    }

    /// 校验并规范化请求
    ///
    /// 幂等键是不透明的，原样存储和哈希，不做 trim。
    pub fn validate(&self) -> Result<ValidatedOrder, PaymentError> {
        let idempotency_key = self.idempotency_key.as_str();
        if idempotency_key.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "idempotencyKey must not be empty".to_string(),
            ));
        }
        if idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(PaymentError::InvalidRequest(format!(
                "idempotencyKey must be at most {} bytes",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }

        let amount = match self.amount {
            Some(amount) => normalize_amount(amount)?,
            None => return Err(PaymentError::InvalidAmount("amount is required".to_string())),
        };
        let currency = normalize_currency(self.currency.as_deref())?;

        Ok(ValidatedOrder {
            merchant_trade_no: derive_merchant_trade_no(idempotency_key),
            idempotency_key: idempotency_key.to_string(),
            terms: OrderTerms { amount, currency },
        })
    }
}

// 非数字的金额交给校验阶段报 InvalidAmount，而不是在反序列化时失败
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => Some(number.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(text)) => Some(text.trim().parse().unwrap_or(f64::NAN)),
        Some(_) => Some(f64::NAN),
    };
    Ok(amount)
}

/// 金额四舍五入到两位小数，必须为有限正数
pub fn normalize_amount(amount: f64) -> Result<Decimal, PaymentError> {
    if !amount.is_finite() {
        return Err(PaymentError::InvalidAmount(
            "amount must be a finite number".to_string(),
        ));
    }

    let mut decimal = Decimal::from_f64(amount)
        .ok_or_else(|| PaymentError::InvalidAmount("amount is out of range".to_string()))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    decimal.rescale(2);

    if decimal <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "amount must be greater than 0.00, got {}",
            decimal
        )));
    }

    Ok(decimal)
}

/// 币种为三位字母代码，缺省 USD
pub fn normalize_currency(currency: Option<&str>) -> Result<String, PaymentError> {
    let currency = currency.map(str::trim).unwrap_or(DEFAULT_CURRENCY);
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PaymentError::InvalidRequest(format!(
            "currency must be a three-letter ISO 4217 code, got {:?}",
            currency
        )));
    }
    Ok(currency.to_ascii_uppercase())
}

/// 一个幂等键对应的订单条款
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTerms {
    pub amount: Decimal,
    pub currency: String,
}

impl OrderTerms {
    /// 固定两位小数的金额文本，例如 `49.99`
    pub fn amount_text(&self) -> String {
        let mut amount = self.amount;
        amount.rescale(2);
        amount.to_string()
    }
}

/// 校验通过的订单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub idempotency_key: String,
    pub merchant_trade_no: String,
    pub terms: OrderTerms,
}

/// 中继内部订单记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderRecord {
    #[serde(skip_serializing)]
    pub idempotency_key: String,
    pub merchant_trade_no: String,
    #[serde(flatten)]
    pub terms: OrderTerms,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_url: Option<String>,
    pub attempts: u32,
    #[serde(skip_serializing)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

impl PaymentOrderRecord {
    /// 新建记录即开始第一次尝试
    pub fn new(order: &ValidatedOrder, now: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: order.idempotency_key.clone(),
            merchant_trade_no: order.merchant_trade_no.clone(),
            terms: order.terms.clone(),
            status: OrderStatus::Pending,
            pay_url: None,
            attempts: 1,
            last_error: None,
            created_at: now,
            last_attempt_at: now,
        }
    }

    /// 本次尝试已进行的时长，时钟回拨时按 0 计
    pub fn in_flight_since(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.last_attempt_at).to_std().unwrap_or_default()
    }

    /// 重新开始一次尝试
    pub fn reopen(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Pending;
        self.attempts += 1;
        self.last_error = None;
        self.last_attempt_at = now;
    }

    pub fn succeed(&mut self, pay_url: String) {
        self.status = OrderStatus::Succeeded;
        self.pay_url = Some(pay_url);
        self.last_error = None;
    }

    pub fn fail(&mut self, reason: String) {
        self.status = OrderStatus::Failed;
        self.pay_url = None;
        self.last_error = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(49.99, dec!(49.99))]
    #[case(10.0, dec!(10.00))]
    #[case(0.01, dec!(0.01))]
    #[case(19.999, dec!(20.00))]
    fn test_normalize_valid_amounts(#[case] input: f64, #[case] expected: Decimal) {
        let amount = normalize_amount(input).unwrap();
        assert_eq!(amount, expected);
        assert_eq!(amount.scale(), 2);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-5.0)]
    #[case(0.004)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    #[case(1e30)]
    fn test_normalize_invalid_amounts(#[case] input: f64) {
        assert!(matches!(
            normalize_amount(input),
            Err(PaymentError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_text_has_two_digits() {
        let terms = OrderTerms {
            amount: dec!(10),
            currency: "USD".to_string(),
        };
        assert_eq!(terms.amount_text(), "10.00");
    }

    #[rstest]
    #[case(None, "USD")]
    #[case(Some("usd"), "USD")]
    #[case(Some(" EUR "), "EUR")]
    fn test_normalize_currency(#[case] input: Option<&str>, #[case] expected: &str) {
        assert_eq!(normalize_currency(input).unwrap(), expected);
    }

    #[rstest]
    #[case(Some(""))]
    #[case(Some("US"))]
    #[case(Some("USDT"))]
    #[case(Some("U5D"))]
    fn test_reject_malformed_currency(#[case] input: Option<&str>) {
        assert!(matches!(
            normalize_currency(input),
            Err(PaymentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_request() {
        let order = PaymentOrderRequest::new(49.99, Some("USD"), "order-abc")
            .validate()
            .unwrap();
        assert_eq!(order.idempotency_key, "order-abc");
        assert_eq!(order.terms.amount_text(), "49.99");
        assert_eq!(order.merchant_trade_no, derive_merchant_trade_no("order-abc"));
    }

    #[test]
    fn test_validate_rejects_missing_amount_and_empty_key() {
        let missing = PaymentOrderRequest {
            amount: None,
            currency: None,
            idempotency_key: "k".to_string(),
        };
        assert!(matches!(missing.validate(), Err(PaymentError::InvalidAmount(_))));

        let empty_key = PaymentOrderRequest::new(1.0, None, "");
        assert!(matches!(empty_key.validate(), Err(PaymentError::InvalidRequest(_))));
    }

    #[test]
    fn test_idempotency_key_is_opaque() {
        let plain = PaymentOrderRequest::new(10.0, None, "order-1").validate().unwrap();
        let padded = PaymentOrderRequest::new(10.0, None, " order-1 ").validate().unwrap();
        assert_eq!(padded.idempotency_key, " order-1 ");
        assert_ne!(plain.merchant_trade_no, padded.merchant_trade_no);

        let blank = PaymentOrderRequest::new(10.0, None, "   ").validate().unwrap();
        assert_eq!(blank.idempotency_key, "   ");
    }

    #[test]
    fn test_idempotency_key_length_is_capped() {
        let at_limit = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        assert!(PaymentOrderRequest::new(1.0, None, at_limit).validate().is_ok());

        let too_long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(matches!(
            PaymentOrderRequest::new(1.0, None, too_long).validate(),
            Err(PaymentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: PaymentOrderRequest =
            serde_json::from_str(r#"{"amount": 49.99, "idempotencyKey": "order-abc"}"#).unwrap();
        assert_eq!(request.amount, Some(49.99));
        assert_eq!(request.currency, None);
        assert_eq!(request.idempotency_key, "order-abc");
    }

    #[rstest]
    #[case(r#"{"amount": "abc", "idempotencyKey": "k"}"#)]
    #[case(r#"{"amount": true, "idempotencyKey": "k"}"#)]
    #[case(r#"{"amount": null, "idempotencyKey": "k"}"#)]
    #[case(r#"{"idempotencyKey": "k"}"#)]
    fn test_malformed_amount_is_invalid_amount(#[case] body: &str) {
        let request: PaymentOrderRequest = serde_json::from_str(body).unwrap();
        assert!(matches!(request.validate(), Err(PaymentError::InvalidAmount(_))));
    }

    #[test]
    fn test_numeric_string_amount_is_accepted() {
        let request: PaymentOrderRequest =
            serde_json::from_str(r#"{"amount": "49.99", "idempotencyKey": "k"}"#).unwrap();
        assert_eq!(request.validate().unwrap().terms.amount_text(), "49.99");
    }

    #[test]
    fn test_record_lifecycle() {
        let order = PaymentOrderRequest::new(5.0, None, "k").validate().unwrap();
        let now = Utc::now();
        let mut record = PaymentOrderRecord::new(&order, now);
        assert_eq!(record.status, OrderStatus::Pending);
        assert_eq!(record.attempts, 1);

        record.fail("timeout".to_string());
        assert_eq!(record.status, OrderStatus::Failed);

        record.reopen(now);
        assert_eq!(record.status, OrderStatus::Pending);
        assert_eq!(record.attempts, 2);

        record.succeed("https://pay.example/k".to_string());
        assert_eq!(record.status, OrderStatus::Succeeded);
        assert_eq!(record.pay_url.as_deref(), Some("https://pay.example/k"));
    }

    #[test]
    fn test_record_view_hides_internal_fields() {
        let order = PaymentOrderRequest::new(5.0, None, "secret-key-name").validate().unwrap();
        let mut record = PaymentOrderRecord::new(&order, Utc::now());
        record.fail("provider said: internal detail".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["amount"], "5.00");
        assert_eq!(json["currency"], "USD");
        assert!(json.get("lastError").is_none());
        assert!(json.get("idempotencyKey").is_none());
        assert!(json.get("payUrl").is_none());
    }
}
