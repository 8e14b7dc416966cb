use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub twilio_sid: String,
    pub twilio_token: String,
    pub twilio_from: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "3000"),
            database_url: read_secret("DATABASE_URL"),
            jwt_secret: read_secret("JWT_SECRET"),
            twilio_sid: read_secret("TWILIO_SID"),
            twilio_token: read_secret("TWILIO_AUTH"),
            twilio_from: read_secret("TWILIO_PHONE"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Credentials come from the environment, falling back to a mounted secret
/// file. The process refuses to start without them.
fn read_secret(secret_name: &str) -> String {
    if let Ok(value) = env::var(secret_name) {
        return value;
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from environment or file: {e}");
        })
        .expect("Secrets misconfigured!")
}

#[cfg(test)]
mod tests {
    use super::try_load;

    #[test]
    fn test_default_port_parses() {
        let port: u16 = try_load("CANTEEN_TEST_UNSET_PORT", "3000");
        assert_eq!(port, 3000);
    }
}
