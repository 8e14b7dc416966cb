use std::sync::Arc;

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::{auth::AuthVendor, error::AppError, state::AppState};

#[derive(Debug, Serialize, FromRow)]
pub struct SalesToday {
    pub total_sales: Decimal,
    pub total_orders: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PopularItem {
    pub name: String,
    pub total_sold: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub sales_today: SalesToday,
    pub popular_items: Vec<PopularItem>,
    pub status_breakdown: Vec<StatusCount>,
}

pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
) -> Result<Json<Analytics>, AppError> {
    let sales_today = sqlx::query_as::<_, SalesToday>(
        "SELECT COALESCE(SUM(total_amount), 0) AS total_sales, COUNT(*) AS total_orders \
         FROM orders \
         WHERE vendor_id = $1 AND created_at::date = CURRENT_DATE",
    )
    .bind(vendor.vendor_id)
    .fetch_one(&state.db)
    .await?;

    // Popularity is canteen-wide; sales and statuses are per vendor.
    let popular_items = sqlx::query_as::<_, PopularItem>(
        "SELECT mi.name, SUM(oi.quantity) AS total_sold \
         FROM order_items oi \
         JOIN menu_items mi ON oi.menu_item_id = mi.id \
         WHERE mi.canteen_id = $1 \
         GROUP BY mi.name \
         ORDER BY total_sold DESC \
         LIMIT 5",
    )
    .bind(vendor.canteen_id)
    .fetch_all(&state.db)
    .await?;

    let status_breakdown = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count \
         FROM orders \
         WHERE vendor_id = $1 AND status IN ('pending', 'preparing', 'almost ready', 'ready') \
         GROUP BY status",
    )
    .bind(vendor.vendor_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Analytics {
        sales_today,
        popular_items,
        status_breakdown,
    }))
}
