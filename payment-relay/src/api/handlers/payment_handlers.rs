use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use std::sync::Arc;
use tracing::info;

use crate::app_state::AppState;
use crate::domain::entities::{PaymentOrderRecord, PaymentOrderRequest};
use crate::services::CreateOrderResponse;
use crate::utils::error::{ApiResponse, PaymentError};

// 创建支付订单
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PaymentOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, PaymentError> {
    let Json(request) = payload?;
    info!(
        provider = state.payment_service.provider_name(),
        "API: create order request received"
    );

    let response = state.payment_service.create_order(request).await?;
    Ok(Json(response))
}

// 查询订单记录
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(idempotency_key): Path<String>,
) -> Result<Json<ApiResponse<PaymentOrderRecord>>, PaymentError> {
    let record = state.payment_service.find_order(&idempotency_key).await?;
    Ok(Json(ApiResponse::success(record)))
}

// 健康检查
pub async fn health() -> &'static str {
    "OK"
}
