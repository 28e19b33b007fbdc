use crate::adapters::{BinancePayAdapter, PaymentProvider};
use crate::config::AppConfig;
use crate::repositories::{InMemoryOrderRepository, OrderRepository};
use crate::services::PaymentService;
use crate::utils::error::PaymentError;
use std::sync::Arc;

/// 应用状态，包含共享资源和服务
pub struct AppState {
    pub config: AppConfig,
    pub payment_service: Arc<PaymentService>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, PaymentError> {
        let provider = Arc::new(BinancePayAdapter::new(
            &config.provider,
            config.relay.provider_timeout(),
        )?);
        Ok(Self::with_provider(config, provider))
    }

    /// 使用指定的渠道实现组装服务
    pub fn with_provider(config: AppConfig, provider: Arc<dyn PaymentProvider>) -> Self {
        let order_repository: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
        let payment_service = Arc::new(PaymentService::from_config(
            &config.relay,
            order_repository,
            provider,
        ));

        Self {
            config,
            payment_service,
        }
    }
}
