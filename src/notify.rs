//! # Notifications
//!
//! Outbound SMS channel. Best effort only: sends are spawned and forgotten,
//! a failure is logged and never reaches the request that triggered it.
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected message: {0}")]
    Rejected(reqwest::StatusCode),
}

/// Destination-and-body message dispatch. Production uses [`TwilioChannel`];
/// tests substitute a recording stub.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError>;
}

pub struct TwilioChannel {
    http: Client,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioChannel {
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            account_sid: config.twilio_sid.clone(),
            auth_token: config.twilio_token.clone(),
            from: config.twilio_from.clone(),
        }
    }
}

#[async_trait]
impl NotificationChannel for TwilioChannel {
    async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }

        Ok(())
    }
}

/// Spawns the send and returns immediately. A slow or failing provider never
/// blocks or fails the triggering request.
pub fn send_best_effort(channel: Arc<dyn NotificationChannel>, to: String, body: String) {
    tokio::spawn(async move {
        match channel.send(&to, &body).await {
            Ok(()) => info!("SMS sent to {to}: \"{body}\""),
            Err(err) => warn!("SMS to {to} failed: {err}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

    use super::*;

    struct Tap {
        seen: UnboundedSender<(String, String)>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for Tap {
        async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError> {
            self.seen.send((to.to_string(), body.to_string())).unwrap();

            if self.fail {
                return Err(NotifyError::Rejected(reqwest::StatusCode::BAD_REQUEST));
            }

            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_best_effort_delivers() {
        let (tx, mut rx) = unbounded_channel();
        let channel = Arc::new(Tap {
            seen: tx,
            fail: false,
        });

        send_best_effort(channel, "+15550001111".to_string(), "hello".to_string());

        let (to, body) = rx.recv().await.unwrap();
        assert_eq!(to, "+15550001111");
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_send_best_effort_swallows_failures() {
        let (tx, mut rx) = unbounded_channel();
        let channel = Arc::new(Tap {
            seen: tx,
            fail: true,
        });

        // The spawned task must not panic or propagate the failure.
        send_best_effort(channel, "+15550001111".to_string(), "hello".to_string());

        assert!(rx.recv().await.is_some());
    }
}
