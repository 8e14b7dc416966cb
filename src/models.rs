use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MenuItem {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub is_available: bool,
    pub canteen_id: i32,
}

/// An order row. `total_amount` is derived at creation time from the
/// snapshotted line-item prices and never recomputed; `queue_position` is
/// assigned by the store.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: i32,
    pub student_name: String,
    pub phone_no: String,
    pub vendor_id: i32,
    pub status: String,
    pub total_amount: Decimal,
    pub queue_position: i32,
    pub created_at: DateTime<Utc>,
}
