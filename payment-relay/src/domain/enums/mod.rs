use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// 中继订单状态
///
/// `Pending` -> `Succeeded` | `Failed`，`Failed` 可在重试时回到 `Pending`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Succeeded,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}
