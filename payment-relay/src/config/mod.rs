mod app_config;
mod secret;

pub use app_config::{
    AppConfig, ConfigLoadError, GoodsConfig, LoggingConfig, ProviderConfig, RelayConfig,
    ServerConfig,
};
pub use secret::Secret;
