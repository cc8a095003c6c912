//! Order model. Orders are append-only purchase records.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub store_id: String,
    /// Exact decimal stored as text
    pub total: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub store_id: String,
    pub total: String,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            store_id: order.store_id,
            total: order.total,
            created_at: order.created_at,
        }
    }
}
