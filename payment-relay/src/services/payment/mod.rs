use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapters::PaymentProvider;
use crate::config::RelayConfig;
use crate::domain::entities::{PaymentOrderRecord, PaymentOrderRequest};
use crate::repositories::{Admission, AdmissionPolicy, OrderRepository};
use crate::utils::error::PaymentError;

pub mod dto;
use dto::CreateOrderResponse;

// 支付中继服务
pub struct PaymentService {
    order_repository: Arc<dyn OrderRepository>,
    provider: Arc<dyn PaymentProvider>,
    policy: AdmissionPolicy,
    provider_timeout: Duration,
}

impl PaymentService {
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        provider: Arc<dyn PaymentProvider>,
        policy: AdmissionPolicy,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            order_repository,
            provider,
            policy,
            provider_timeout,
        }
    }

    pub fn from_config(
        config: &RelayConfig,
        order_repository: Arc<dyn OrderRepository>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let policy = AdmissionPolicy {
            in_flight_window: config.in_flight_window(),
            max_attempts: config.max_attempts,
        };
        Self::new(order_repository, provider, policy, config.provider_timeout())
    }

    // 创建支付订单，同一个幂等键最多对应一次成功的渠道下单
    pub async fn create_order(
        &self,
        request: PaymentOrderRequest,
    ) -> Result<CreateOrderResponse, PaymentError> {
        let order = request.validate().inspect_err(|e| {
            warn!(error = %e, "Rejected invalid order request");
        })?;

        let admission = self
            .order_repository
            .admit(&order, self.policy, Utc::now())
            .await?;

        match admission {
            Admission::Completed(record) => {
                info!(
                    merchant_trade_no = %record.merchant_trade_no,
                    "Returning cached pay url"
                );
                record.pay_url.map(CreateOrderResponse::new).ok_or_else(|| {
                    PaymentError::Internal(format!(
                        "succeeded order {} has no pay url",
                        record.merchant_trade_no
                    ))
                })
            }
            Admission::InFlight(record) => {
                info!(
                    merchant_trade_no = %record.merchant_trade_no,
                    attempt = record.attempts,
                    "Order already in flight"
                );
                Err(PaymentError::RequestInFlight {
                    merchant_trade_no: record.merchant_trade_no,
                })
            }
            Admission::Exhausted(record) => {
                warn!(
                    merchant_trade_no = %record.merchant_trade_no,
                    attempts = record.attempts,
                    "Order attempts exhausted"
                );
                Err(PaymentError::AttemptsExhausted {
                    merchant_trade_no: record.merchant_trade_no,
                    attempts: record.attempts,
                })
            }
            Admission::Proceed(record) => self.dispatch(record).await,
        }
    }

    // 查询订单记录
    pub async fn find_order(&self, idempotency_key: &str) -> Result<PaymentOrderRecord, PaymentError> {
        self.order_repository
            .find(idempotency_key)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("order {} not found", idempotency_key)))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    // 渠道调用放在独立任务里，调用方断开也会落库
    async fn dispatch(&self, record: PaymentOrderRecord) -> Result<CreateOrderResponse, PaymentError> {
        let order_repository = Arc::clone(&self.order_repository);
        let provider = Arc::clone(&self.provider);
        let timeout = self.provider_timeout;

        let task = tokio::spawn(async move {
            call_provider(order_repository, provider, record, timeout).await
        });

        task.await?
    }
}

async fn call_provider(
    order_repository: Arc<dyn OrderRepository>,
    provider: Arc<dyn PaymentProvider>,
    record: PaymentOrderRecord,
    timeout: Duration,
) -> Result<CreateOrderResponse, PaymentError> {
    info!(
        merchant_trade_no = %record.merchant_trade_no,
        attempt = record.attempts,
        provider = provider.name(),
        "Calling payment provider"
    );

    let outcome = match tokio::time::timeout(timeout, provider.create_order(&record)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(PaymentError::transport(format!(
            "provider call exceeded {}s",
            timeout.as_secs()
        ))),
    };

    match outcome {
        Ok(session) => {
            if let Err(e) = order_repository
                .mark_succeeded(&record.idempotency_key, record.attempts, session.pay_url.clone())
                .await
            {
                warn!(
                    merchant_trade_no = %record.merchant_trade_no,
                    attempt = record.attempts,
                    error = %e,
                    "Failed to record provider success"
                );
            }

            info!(
                merchant_trade_no = %record.merchant_trade_no,
                attempt = record.attempts,
                "Payment order created"
            );
            Ok(CreateOrderResponse::new(session.pay_url))
        }
        Err(err) => {
            if let Err(e) = order_repository
                .mark_failed(&record.idempotency_key, record.attempts, err.to_string())
                .await
            {
                warn!(
                    merchant_trade_no = %record.merchant_trade_no,
                    attempt = record.attempts,
                    error = %e,
                    "Failed to record provider failure"
                );
            }

            error!(
                merchant_trade_no = %record.merchant_trade_no,
                attempt = record.attempts,
                error_code = %err.code(),
                retryable = err.is_retryable(),
                "Payment order failed"
            );
            Err(err)
        }
    }
}
