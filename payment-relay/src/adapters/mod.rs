use async_trait::async_trait;

use crate::domain::entities::PaymentOrderRecord;
use crate::utils::error::PaymentError;

pub mod binance;

pub use binance::BinancePayAdapter;

/// 渠道下单结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// 托管收银台地址
    pub pay_url: String,
    /// 渠道侧订单号，仅用于日志
    pub provider_order_id: Option<String>,
}

/// 支付渠道公共接口
///
/// 实现方只负责一次签名请求，不做重试，也不关心幂等。
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// 渠道名称
    fn name(&self) -> &'static str;

    /// 在渠道创建订单，成功时返回收银台地址
    ///
    /// 渠道明确拒绝返回 `ProviderRejected`，网络、超时和无法解析的响应返回
    /// `TransportFailure`。
    async fn create_order(&self, order: &PaymentOrderRecord) -> Result<CheckoutSession, PaymentError>;
}
