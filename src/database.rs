//! # Postgres
//!
//! Relational store for vendors, menu items, orders, and order line items.
//!
//! Order creation is the only multi-statement write and runs in a single
//! transaction; everything else is one parameterized statement. The store
//! also owns the queue-position counter (a sequence-backed column), so no
//! position is ever computed in application code.
use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

pub async fn init_postgres(database_url: &str) -> PgPool {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .unwrap();

    sqlx::migrate!().run(&pool).await.unwrap();

    info!("Database ready");

    pool
}
