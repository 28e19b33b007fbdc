use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::secret::Secret;

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout: u64, // 秒
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RelayConfig {
    pub in_flight_window: u64, // 秒
    pub max_attempts: u32,
    pub provider_timeout: u64, // 秒
}

impl RelayConfig {
    pub fn in_flight_window(&self) -> Duration {
        Duration::from_secs(self.in_flight_window)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout)
    }
}

/// 商品描述，所有订单共用
#[derive(Clone, Debug, Deserialize)]
pub struct GoodsConfig {
    pub goods_type: String,
    pub goods_category: String,
    pub reference_goods_id: String,
    pub goods_name: String,
    pub goods_detail: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    pub api_url: String,
    pub order_path: String,
    pub certificate_sn: Secret,
    pub secret_key: Secret,
    pub user_agent: String,
    pub goods: GoodsConfig,
}

impl ProviderConfig {
    pub fn order_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            self.order_path.trim_start_matches('/')
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub relay: RelayConfig,
    pub provider: ProviderConfig,
    pub environment: String,
    pub service_name: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigLoadError> {
        let config_path = dotenvy::var("CONFIG_PATH").unwrap_or_else(|_| {
            format!("{}/config/application.toml", env!("CARGO_MANIFEST_DIR"))
        });

        info!("Loading configuration from {}", &config_path);

        let builder = Config::builder()
            .add_source(File::from(Path::new(&config_path)))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.provider.secret_key.is_empty() {
            return Err(ConfigLoadError::Invalid(
                "provider.secret_key must be set".to_string(),
            ));
        }
        if self.provider.certificate_sn.is_empty() {
            return Err(ConfigLoadError::Invalid(
                "provider.certificate_sn must be set".to_string(),
            ));
        }
        if self.relay.max_attempts == 0 {
            return Err(ConfigLoadError::Invalid(
                "relay.max_attempts must be at least 1".to_string(),
            ));
        }
        // 在途窗口必须覆盖一次完整的渠道调用
        if self.relay.provider_timeout == 0
            || self.relay.provider_timeout >= self.relay.in_flight_window
        {
            return Err(ConfigLoadError::Invalid(format!(
                "relay.provider_timeout ({}s) must be non-zero and shorter than relay.in_flight_window ({}s)",
                self.relay.provider_timeout, self.relay.in_flight_window
            )));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                cors_origins: vec!["*".to_string()],
                request_timeout: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
            relay: RelayConfig {
                in_flight_window: 30,
                max_attempts: 3,
                provider_timeout: 15,
            },
            provider: ProviderConfig {
                api_url: "https://bpay.binanceapi.com".to_string(),
                order_path: "/binancepay/openapi/v2/order".to_string(),
                certificate_sn: Secret::default(),
                secret_key: Secret::default(),
                user_agent: format!("PaymentRelay/{}", env!("CARGO_PKG_VERSION")),
                goods: GoodsConfig {
                    goods_type: "01".to_string(),
                    goods_category: "D000".to_string(),
                    reference_goods_id: "ArocShop".to_string(),
                    goods_name: "Aroc Shop Order".to_string(),
                    goods_detail: "Order payment".to_string(),
                },
            },
            environment: "development".to_string(),
            service_name: "payment_relay".to_string(),
        }
    }
}
