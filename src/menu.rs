use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{auth::AuthVendor, error::AppError, models::MenuItem, state::AppState};

#[derive(Debug, Deserialize)]
pub struct MenuItemInput {
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

fn validate_item(input: &MenuItemInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required.".into()));
    }

    if input.price < Decimal::ZERO {
        return Err(AppError::Validation("Price must be non-negative.".into()));
    }

    Ok(())
}

pub async fn list_menu_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    let items = sqlx::query_as::<_, MenuItem>(
        "SELECT * FROM menu_items WHERE canteen_id = $1 ORDER BY name ASC",
    )
    .bind(vendor.canteen_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(items))
}

pub async fn create_item_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
    Json(input): Json<MenuItemInput>,
) -> Result<(StatusCode, Json<MenuItem>), AppError> {
    validate_item(&input)?;

    let item = sqlx::query_as::<_, MenuItem>(
        "INSERT INTO menu_items (name, price, description, is_available, canteen_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.description)
    .bind(input.is_available)
    .bind(vendor.canteen_id)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
    Path(item_id): Path<i32>,
    Json(input): Json<MenuItemInput>,
) -> Result<Json<MenuItem>, AppError> {
    validate_item(&input)?;

    // Scoping by canteen makes a foreign item indistinguishable from a
    // missing one.
    let item = sqlx::query_as::<_, MenuItem>(
        "UPDATE menu_items SET name = $1, price = $2, description = $3, is_available = $4 \
         WHERE id = $5 AND canteen_id = $6 RETURNING *",
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.description)
    .bind(input.is_available)
    .bind(item_id)
    .bind(vendor.canteen_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Item not found.".into()))?;

    Ok(Json(item))
}

pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
    Path(item_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted: Option<i32> =
        sqlx::query_scalar("DELETE FROM menu_items WHERE id = $1 AND canteen_id = $2 RETURNING id")
            .bind(item_id)
            .bind(vendor.canteen_id)
            .fetch_optional(&state.db)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::Conflict(
                    "Item is part of an existing order and cannot be deleted.".into(),
                ),
                _ => AppError::Database(err),
            })?;

    deleted.ok_or_else(|| AppError::NotFound("Item not found.".into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, price: &str) -> MenuItemInput {
        MenuItemInput {
            name: name.to_string(),
            price: price.parse().unwrap(),
            description: None,
            is_available: true,
        }
    }

    #[test]
    fn test_item_validation() {
        assert!(validate_item(&input("Samosa", "12.50")).is_ok());
        assert!(validate_item(&input("Water", "0.00")).is_ok());

        assert!(validate_item(&input("   ", "12.50")).is_err());
        assert!(validate_item(&input("Samosa", "-0.01")).is_err());
    }
}
