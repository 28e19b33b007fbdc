use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::entities::{PaymentOrderRecord, ValidatedOrder};
use crate::domain::enums::OrderStatus;
use crate::utils::error::PaymentError;

/// 准入策略
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    /// 超过这个时长的 `PENDING` 记录视为被遗弃
    pub in_flight_window: Duration,
    /// 每个幂等键最多发起的渠道调用次数
    pub max_attempts: u32,
}

/// 一次下单请求的准入结果
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// 调用方获得本次渠道调用的执行权
    Proceed(PaymentOrderRecord),
    /// 已成功，直接返回缓存的支付链接
    Completed(PaymentOrderRecord),
    /// 同一个键的调用仍在进行
    InFlight(PaymentOrderRecord),
    /// 已失败且次数用尽
    Exhausted(PaymentOrderRecord),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 原子地查找或创建记录，并决定本次请求能否调用渠道
    async fn admit(
        &self,
        order: &ValidatedOrder,
        policy: AdmissionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Admission, PaymentError>;

    async fn mark_succeeded(
        &self,
        idempotency_key: &str,
        attempt: u32,
        pay_url: String,
    ) -> Result<PaymentOrderRecord, PaymentError>;

    async fn mark_failed(
        &self,
        idempotency_key: &str,
        attempt: u32,
        reason: String,
    ) -> Result<PaymentOrderRecord, PaymentError>;

    async fn find(&self, idempotency_key: &str) -> Result<Option<PaymentOrderRecord>, PaymentError>;
}

/// 进程内订单记录，一把互斥锁保护整张表
///
/// 记录在进程生命周期内一直保留，不做过期清理，重启后全部丢失。
/// 每条记录的大小受幂等键长度上限约束。
#[derive(Default, Clone)]
pub struct InMemoryOrderRepository {
    records: Arc<Mutex<HashMap<String, PaymentOrderRecord>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn settle<F>(
        &self,
        idempotency_key: &str,
        attempt: u32,
        apply: F,
    ) -> Result<PaymentOrderRecord, PaymentError>
    where
        F: FnOnce(&mut PaymentOrderRecord) + Send,
    {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(idempotency_key)
            .ok_or_else(|| PaymentError::Internal("settling an unknown order".to_string()))?;

        // 被接管的旧尝试不能覆盖新尝试的结果
        if record.status.is_terminal() || record.attempts != attempt {
            return Err(PaymentError::Internal(format!(
                "stale settlement for {} (attempt {}, current {} {})",
                record.merchant_trade_no, attempt, record.status, record.attempts
            )));
        }

        apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn admit(
        &self,
        order: &ValidatedOrder,
        policy: AdmissionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Admission, PaymentError> {
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(&order.idempotency_key) else {
            let record = PaymentOrderRecord::new(order, now);
            records.insert(order.idempotency_key.clone(), record.clone());
            return Ok(Admission::Proceed(record));
        };

        if record.terms != order.terms {
            return Err(PaymentError::IdempotencyConflict(record.merchant_trade_no.clone()));
        }

        let admission = match record.status {
            OrderStatus::Succeeded => Admission::Completed(record.clone()),
            OrderStatus::Pending => {
                if record.in_flight_since(now) < policy.in_flight_window {
                    Admission::InFlight(record.clone())
                } else if record.attempts >= policy.max_attempts {
                    Admission::Exhausted(record.clone())
                } else {
                    record.reopen(now);
                    Admission::Proceed(record.clone())
                }
            }
            OrderStatus::Failed => {
                if record.attempts >= policy.max_attempts {
                    Admission::Exhausted(record.clone())
                } else {
                    record.reopen(now);
                    Admission::Proceed(record.clone())
                }
            }
        };

        Ok(admission)
    }

    async fn mark_succeeded(
        &self,
        idempotency_key: &str,
        attempt: u32,
        pay_url: String,
    ) -> Result<PaymentOrderRecord, PaymentError> {
        self.settle(idempotency_key, attempt, |record| record.succeed(pay_url))
            .await
    }

    async fn mark_failed(
        &self,
        idempotency_key: &str,
        attempt: u32,
        reason: String,
    ) -> Result<PaymentOrderRecord, PaymentError> {
        self.settle(idempotency_key, attempt, |record| record.fail(reason))
            .await
    }

    async fn find(&self, idempotency_key: &str) -> Result<Option<PaymentOrderRecord>, PaymentError> {
        let records = self.records.lock().await;
        Ok(records.get(idempotency_key).cloned())
    }
}
