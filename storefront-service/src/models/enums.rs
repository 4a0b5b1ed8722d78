use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[strum(serialize = "ACTIVE")]
    Active,
    #[strum(serialize = "DELETED")]
    Deleted,
}

// 订单状态只能前进，转换表见 domain::events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "RESERVED")]
    Reserved,
    #[strum(serialize = "PAID")]
    Paid,
    #[strum(serialize = "COMPLETED")]
    Completed,
    #[strum(serialize = "CANCELLED")]
    Cancelled,
}
