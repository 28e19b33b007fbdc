#![allow(dead_code)]

use async_trait::async_trait;
use payment_relay::adapters::{CheckoutSession, PaymentProvider};
use payment_relay::config::{AppConfig, Secret};
use payment_relay::domain::entities::PaymentOrderRecord;
use payment_relay::PaymentError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_CERT_SN: &str = "test-cert";

/// 带测试凭据的配置
pub fn test_config(api_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.provider.api_url = api_url.to_string();
    config.provider.secret_key = Secret::new(TEST_SECRET);
    config.provider.certificate_sn = Secret::new(TEST_CERT_SN);
    config.relay.provider_timeout = 5;
    config
}

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    FailFirst(usize),
    Reject,
}

/// 计数的渠道桩
pub struct StubProvider {
    calls: AtomicUsize,
    pay_url: String,
    behavior: Behavior,
    delay: Duration,
}

impl StubProvider {
    pub fn succeeding(pay_url: &str) -> Self {
        Self::build(pay_url, Behavior::Succeed)
    }

    /// 前 n 次返回传输错误，之后成功
    pub fn failing_first(failures: usize, pay_url: &str) -> Self {
        Self::build(pay_url, Behavior::FailFirst(failures))
    }

    pub fn rejecting() -> Self {
        Self::build("", Behavior::Reject)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn build(pay_url: &str, behavior: Behavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            pay_url: pay_url.to_string(),
            behavior,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn create_order(&self, order: &PaymentOrderRecord) -> Result<CheckoutSession, PaymentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            Behavior::FailFirst(failures) if call <= failures => {
                Err(PaymentError::transport("connection failed"))
            }
            Behavior::Reject => Err(PaymentError::provider_rejected(
                "400201",
                "internal provider detail",
            )),
            _ => Ok(CheckoutSession {
                pay_url: self.pay_url.clone(),
                provider_order_id: Some(format!("prepay-{}", order.merchant_trade_no)),
            }),
        }
    }
}
