use crate::config::AppConfig;
use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::Request;
use std::path::Path;
use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};
use uuid::Uuid;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 初始化日志，返回的 guard 必须由调用方持有到进程退出
pub fn init_logging(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "{}={},tower_http=info",
                config.service_name, config.logging.level
            ))
        })
        .context("invalid log filter")?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.logging.json_format {
        layers.push(fmt::layer().json().with_span_events(FmtSpan::CLOSE).boxed());
    } else {
        layers.push(fmt::layer().with_span_events(FmtSpan::CLOSE).boxed());
    }

    // 如果配置了日志文件路径，添加文件输出
    let guard = match &config.logging.file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file path {} has no file name", file_path))?;

            let file_appender = tracing_appender::rolling::daily(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

            if config.logging.json_format {
                layers.push(file_layer.json().boxed());
            } else {
                layers.push(file_layer.boxed());
            }
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!("Logging initialized with level: {}", config.logging.level);

    Ok(guard)
}

/// 为每个请求创建带 request_id 的 span
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|id| id.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    )
}

