//! Canteen vendor-ordering dashboard backend.
//!
//! Vendors log in, manage their canteen's menu, take student orders at the
//! counter, and walk each order through a fixed status pipeline
//! (`pending → preparing → almost ready → ready`, with `pending → cancelled`
//! as the other exit). Every forward step texts the student through the
//! notification channel, and a student can reply `DROP` to cancel their most
//! recent pending order.
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path                 | Auth   | Purpose                         |
//! |--------|----------------------|--------|---------------------------------|
//! | POST   | /vendor/register     | none   | Create a vendor account         |
//! | POST   | /vendor/login        | none   | Issue an 8-hour bearer token    |
//! | GET    | /menu                | bearer | List the canteen's menu         |
//! | POST   | /menu                | bearer | Add a menu item                 |
//! | PUT    | /menu/{id}           | bearer | Update a menu item              |
//! | DELETE | /menu/{id}           | bearer | Remove a menu item              |
//! | POST   | /order               | bearer | Create an order (atomic)        |
//! | GET    | /orders              | bearer | Vendor's orders, newest first   |
//! | PUT    | /order/{id}/status   | bearer | Advance the status pipeline     |
//! | GET    | /analytics           | bearer | Daily sales, top items, statuses|
//! | POST   | /sms                 | none   | Inbound reply webhook (Twilio)  |
//!
//!
//!
//! # Setup
//!
//! Required configuration, from the environment or `/run/secrets/<NAME>`:
//! `DATABASE_URL`, `JWT_SECRET`, `TWILIO_SID`, `TWILIO_AUTH`, `TWILIO_PHONE`.
//! The process refuses to start without them. `RUST_PORT` defaults to 3000.
//!
//! Migrations under `migrations/` run automatically at startup.
use std::time::Duration;

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod analytics;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod menu;
pub mod models;
pub mod notify;
pub mod orders;
pub mod state;

use analytics::analytics_handler;
use auth::{login_handler, register_handler};
use menu::{create_item_handler, delete_item_handler, list_menu_handler, update_item_handler};
use orders::{create_order_handler, list_orders_handler, sms_webhook_handler, update_status_handler};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/vendor/register", post(register_handler))
        .route("/vendor/login", post(login_handler))
        .route("/menu", get(list_menu_handler).post(create_item_handler))
        .route("/menu/{id}", put(update_item_handler).delete(delete_item_handler))
        .route("/order", post(create_order_handler))
        .route("/orders", get(list_orders_handler))
        .route("/order/{id}/status", put(update_status_handler))
        .route("/analytics", get(analytics_handler))
        .route("/sms", post(sms_webhook_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
