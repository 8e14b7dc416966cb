//! # Order Lifecycle
//!
//! Order creation and the status pipeline.
//!
//! Creation inserts the order and all of its line items in one transaction.
//! Each line item snapshots the menu item's price at that moment into
//! `price_at_order`, so later price changes never alter an existing order's
//! total. Any unavailable or missing item aborts the whole transaction; the
//! store ends up with either the complete order or nothing.
//!
//! Statuses move one way:
//!
//! ```text
//! pending -> preparing -> almost ready -> ready
//! pending -> cancelled
//! ```
//!
//! Skipping forward through the pipeline is allowed; moving backwards,
//! leaving a terminal state, or cancelling past `pending` is not.
//! Re-applying an order's current status is permitted and resends the
//! notification; the system does not deduplicate sends. Moves into
//! `preparing`, `almost ready`, and `ready` each text the student. The
//! student side can cancel their latest pending order by replying with the
//! [`CANCEL_KEYWORD`] to the inbound SMS webhook.
use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    auth::AuthVendor, error::AppError, models::Order, notify::send_best_effort, state::AppState,
};

/// Reply keyword a student texts back to drop their latest pending order.
pub const CANCEL_KEYWORD: &str = "DROP";

/// The webhook always acknowledges with this empty TwiML envelope.
const EMPTY_TWIML: &str = "<Response></Response>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Preparing,
    AlmostReady,
    Ready,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::AlmostReady => "almost ready",
            OrderStatus::Ready => "ready",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "preparing" => Some(OrderStatus::Preparing),
            "almost ready" => Some(OrderStatus::AlmostReady),
            "ready" => Some(OrderStatus::Ready),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Position in the fulfilment pipeline; `cancelled` sits outside it.
    fn pipeline_rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Preparing => Some(1),
            OrderStatus::AlmostReady => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// Orders only move forward through the pipeline (skipping stages is
    /// fine), cancellation is only reachable from `pending`, and re-applying
    /// the current status is allowed.
    pub fn can_become(self, next: Self) -> bool {
        if self == next {
            return true;
        }

        match (self.pipeline_rank(), next.pipeline_rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(0), None) => true,
            _ => false,
        }
    }

    /// Message texted to the student when an order enters this status.
    /// `pending` and `cancelled` send nothing from the vendor path.
    pub fn notification(self) -> Option<&'static str> {
        match self {
            OrderStatus::Preparing => Some("Your order is being prepared."),
            OrderStatus::AlmostReady => Some("Almost ready! Please head to the counter."),
            OrderStatus::Ready => Some("Your order is ready for pickup!"),
            OrderStatus::Pending | OrderStatus::Cancelled => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub student_name: String,
    pub phone_no: String,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLine {
    pub item_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: i32,
    pub status: &'static str,
    pub queue_position: i32,
}

fn validate_create(payload: &CreateOrder) -> Result<(), AppError> {
    if payload.student_name.trim().is_empty() {
        return Err(AppError::Validation("Student name is required.".into()));
    }

    if payload.phone_no.trim().is_empty() {
        return Err(AppError::Validation("Phone number is required.".into()));
    }

    if payload.items.is_empty() {
        return Err(AppError::Validation("At least one item is required.".into()));
    }

    if let Some(line) = payload.items.iter().find(|line| line.quantity <= 0) {
        return Err(AppError::Validation(format!(
            "Quantity for item {} must be a positive integer.",
            line.item_id
        )));
    }

    Ok(())
}

/// Totals are stored with two decimal places, rounding half away from zero.
fn round_total(total: Decimal) -> Decimal {
    total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
    Json(payload): Json<CreateOrder>,
) -> Result<(StatusCode, Json<CreatedOrder>), AppError> {
    validate_create(&payload)?;

    let mut tx = state.db.begin().await?;

    let (order_id, queue_position): (i32, i32) = sqlx::query_as(
        "INSERT INTO orders (student_name, phone_no, vendor_id, status, total_amount) \
         VALUES ($1, $2, $3, 'pending', 0) RETURNING id, queue_position",
    )
    .bind(&payload.student_name)
    .bind(&payload.phone_no)
    .bind(vendor.vendor_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut total = Decimal::ZERO;

    for line in &payload.items {
        // Price and availability are read inside the transaction, so a
        // concurrent menu update cannot tear the total.
        let price: Option<Decimal> =
            sqlx::query_scalar("SELECT price FROM menu_items WHERE id = $1 AND is_available = TRUE")
                .bind(line.item_id)
                .fetch_optional(&mut *tx)
                .await?;

        // Returning here drops the transaction, rolling back the order row
        // and every line item inserted so far.
        let Some(price) = price else {
            return Err(AppError::Validation(format!(
                "Item with ID {} is not available or does not exist.",
                line.item_id
            )));
        };

        total += price * Decimal::from(line.quantity);

        sqlx::query(
            "INSERT INTO order_items (order_id, menu_item_id, quantity, price_at_order) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(line.item_id)
        .bind(line.quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE orders SET total_amount = $1 WHERE id = $2")
        .bind(round_total(total))
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    send_best_effort(
        state.notifier.clone(),
        payload.phone_no.clone(),
        format!(
            "Your order has been placed! Your queue position is #{queue_position}. Estimated wait: 15 mins."
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedOrder {
            order_id,
            status: OrderStatus::Pending.as_str(),
            queue_position,
        }),
    ))
}

pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE vendor_id = $1 ORDER BY created_at DESC")
            .bind(vendor.vendor_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatus {
    pub status: String,
}

pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    vendor: AuthVendor,
    Path(order_id): Path<i32>,
    Json(payload): Json<UpdateStatus>,
) -> Result<Json<Order>, AppError> {
    let Some(next) = OrderStatus::parse(&payload.status) else {
        return Err(AppError::Validation(format!(
            "Unknown status \"{}\".",
            payload.status
        )));
    };

    // Absent and foreign-owned orders answer with the same 404.
    let current = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND vendor_id = $2")
        .bind(order_id)
        .bind(vendor.vendor_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found.".into()))?;

    let from = OrderStatus::parse(&current.status).ok_or_else(|| {
        AppError::Internal(format!(
            "order {order_id} has unrecognized status \"{}\"",
            current.status
        ))
    })?;

    if !from.can_become(next) {
        return Err(AppError::Validation(format!(
            "Cannot move an order from \"{}\" to \"{}\".",
            from.as_str(),
            next.as_str()
        )));
    }

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $1 WHERE id = $2 AND vendor_id = $3 RETURNING *",
    )
    .bind(next.as_str())
    .bind(order_id)
    .bind(vendor.vendor_id)
    .fetch_one(&state.db)
    .await?;

    if let Some(message) = next.notification() {
        send_best_effort(state.notifier.clone(), order.phone_no.clone(), message.to_string());
    }

    Ok(Json(order))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InboundSms {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: String,
}

fn is_cancellation(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case(CANCEL_KEYWORD)
}

/// Inbound reply webhook. Always acknowledges with 200 and an empty TwiML
/// envelope; the cancellation itself is conditional and best effort.
pub async fn sms_webhook_handler(
    State(state): State<Arc<AppState>>,
    Form(inbound): Form<InboundSms>,
) -> impl IntoResponse {
    if is_cancellation(&inbound.body) {
        match cancel_latest_pending(&state, &inbound.from).await {
            Ok(Some(order_id)) => {
                info!("order {order_id} dropped by {}", inbound.from);

                send_best_effort(
                    state.notifier.clone(),
                    inbound.from.clone(),
                    "Your most recent order has been dropped.".to_string(),
                );
            }
            Ok(None) => {}
            Err(err) => error!("SMS drop for {} failed: {err}", inbound.from),
        }
    }

    ([(CONTENT_TYPE, "text/xml")], EMPTY_TWIML)
}

/// Cancels the sender's single most recent pending order in one statement.
/// Older orders and orders already past `pending` are untouched.
async fn cancel_latest_pending(
    state: &AppState,
    phone_no: &str,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE orders SET status = 'cancelled' \
         WHERE id = (\
             SELECT id FROM orders \
             WHERE phone_no = $1 AND status = 'pending' \
             ORDER BY created_at DESC \
             LIMIT 1\
         ) \
         RETURNING id",
    )
    .bind(phone_no)
    .fetch_optional(&state.db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    use OrderStatus::*;

    const ALL_STATUSES: [OrderStatus; 5] = [Pending, Preparing, AlmostReady, Ready, Cancelled];

    #[test]
    fn test_status_strings_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }

        assert_eq!(OrderStatus::parse("almost ready"), Some(AlmostReady));
        assert_eq!(OrderStatus::parse("almost_ready"), None);
        assert_eq!(OrderStatus::parse("Pending"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn test_pipeline_moves_forward_only() {
        assert!(Pending.can_become(Preparing));
        assert!(Pending.can_become(Cancelled));
        assert!(Preparing.can_become(AlmostReady));
        assert!(AlmostReady.can_become(Ready));

        // Skipping forward is allowed.
        assert!(Pending.can_become(Ready));
        assert!(Preparing.can_become(Ready));

        // No moving backwards, no leaving terminals, no cancelling an order
        // already in preparation.
        assert!(!Preparing.can_become(Pending));
        assert!(!Preparing.can_become(Cancelled));
        assert!(!AlmostReady.can_become(Preparing));
        assert!(!Ready.can_become(Pending));
        assert!(!Ready.can_become(Preparing));
        assert!(!Ready.can_become(Cancelled));
        assert!(!Cancelled.can_become(Pending));
        assert!(!Cancelled.can_become(Ready));
    }

    #[test]
    fn test_reapplying_status_is_allowed() {
        for status in ALL_STATUSES {
            assert!(status.can_become(status));
        }
    }

    #[test]
    fn test_notifications_only_for_forward_progress() {
        assert!(Preparing.notification().is_some());
        assert!(AlmostReady.notification().is_some());
        assert!(Ready.notification().is_some());
        assert!(Pending.notification().is_none());
        assert!(Cancelled.notification().is_none());

        // Each forward step has its own distinct message.
        assert_ne!(Preparing.notification(), AlmostReady.notification());
        assert_ne!(AlmostReady.notification(), Ready.notification());
    }

    #[test]
    fn test_total_rounds_half_away_from_zero() {
        let exact: Decimal = "100.00".parse().unwrap();
        assert_eq!(round_total(exact), "100.00".parse::<Decimal>().unwrap());

        // 3 x 3.335 lands on a midpoint.
        let midpoint: Decimal = "10.005".parse().unwrap();
        assert_eq!(round_total(midpoint), "10.01".parse::<Decimal>().unwrap());

        let below: Decimal = "10.004".parse().unwrap();
        assert_eq!(round_total(below), "10.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_line_totals_accumulate() {
        let price: Decimal = "50.00".parse().unwrap();
        let total = price * Decimal::from(2);

        assert_eq!(round_total(total), "100.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_create_order_validation() {
        let valid = CreateOrder {
            student_name: "Priya".to_string(),
            phone_no: "+15550001111".to_string(),
            items: vec![OrderLine {
                item_id: 1,
                quantity: 2,
            }],
        };
        assert!(validate_create(&valid).is_ok());

        let blank_name = CreateOrder {
            student_name: "   ".to_string(),
            ..order_with_one_line()
        };
        assert!(validate_create(&blank_name).is_err());

        let blank_phone = CreateOrder {
            phone_no: String::new(),
            ..order_with_one_line()
        };
        assert!(validate_create(&blank_phone).is_err());

        let no_items = CreateOrder {
            items: vec![],
            ..order_with_one_line()
        };
        assert!(validate_create(&no_items).is_err());

        let zero_quantity = CreateOrder {
            items: vec![OrderLine {
                item_id: 1,
                quantity: 0,
            }],
            ..order_with_one_line()
        };
        assert!(validate_create(&zero_quantity).is_err());

        let negative_quantity = CreateOrder {
            items: vec![OrderLine {
                item_id: 1,
                quantity: -3,
            }],
            ..order_with_one_line()
        };
        assert!(validate_create(&negative_quantity).is_err());
    }

    fn order_with_one_line() -> CreateOrder {
        CreateOrder {
            student_name: "Priya".to_string(),
            phone_no: "+15550001111".to_string(),
            items: vec![OrderLine {
                item_id: 1,
                quantity: 1,
            }],
        }
    }

    #[test]
    fn test_cancellation_keyword_matching() {
        assert!(is_cancellation("DROP"));
        assert!(is_cancellation("drop"));
        assert!(is_cancellation("  Drop  "));

        assert!(!is_cancellation("STOP"));
        assert!(!is_cancellation("DROP IT"));
        assert!(!is_cancellation(""));
    }
}
