use std::sync::Arc;

use sqlx::PgPool;

use super::{
    config::Config,
    database::init_postgres,
    notify::{NotificationChannel, TwilioChannel},
};

pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    pub notifier: Arc<dyn NotificationChannel>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let db = init_postgres(&config.database_url).await;
        let notifier: Arc<dyn NotificationChannel> = Arc::new(TwilioChannel::new(&config));

        Arc::new(Self {
            config,
            db,
            notifier,
        })
    }
}
