pub mod adapters;
pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod repositories;
pub mod server;
pub mod services;
pub mod utils;

// 重新导出关键组件，便于外部调用
pub use app_state::AppState;
pub use config::AppConfig;
pub use services::PaymentService;
pub use utils::error::PaymentError;
