use serde::{Deserialize, Serialize};

/// 下单成功的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub pay_url: String,
}

impl CreateOrderResponse {
    pub fn new(pay_url: impl Into<String>) -> Self {
        Self {
            pay_url: pay_url.into(),
        }
    }
}
