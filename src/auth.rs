use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tokio::task::spawn_blocking;

use crate::{error::AppError, state::AppState};

const TOKEN_VALIDITY_HOURS: i64 = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub vendor_id: i32,
    pub canteen_id: i32,
    pub exp: i64,
}

pub fn issue_token(vendor_id: i32, canteen_id: i32, secret: &str) -> Result<String, AppError> {
    let claims = Claims {
        vendor_id,
        canteen_id,
        exp: (Utc::now() + Duration::hours(TOKEN_VALIDITY_HOURS)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidToken)
}

/// Vendor identity attached to a request by its bearer token.
///
/// Missing header or token part is a 401; a bad signature, garbled token, or
/// expired claim is a 403.
#[derive(Debug, Clone, Copy)]
pub struct AuthVendor {
    pub vendor_id: i32,
    pub canteen_id: i32,
}

impl FromRequestParts<Arc<AppState>> for AuthVendor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
            .ok_or(AppError::MalformedToken)?;

        let claims = verify_token(token, &state.config.jwt_secret)?;

        Ok(Self {
            vendor_id: claims.vendor_id,
            canteen_id: claims.canteen_id,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVendor {
    pub canteen_id: i32,
    pub username: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RegisteredVendor {
    pub id: i32,
    pub username: String,
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterVendor>,
) -> Result<(StatusCode, Json<RegisteredVendor>), AppError> {
    if payload.username.trim().is_empty()
        || payload.password.is_empty()
        || payload.name.trim().is_empty()
    {
        return Err(AppError::Validation("All fields are required.".into()));
    }

    let password = payload.password.clone();
    let password_hash = spawn_blocking(move || bcrypt::hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let vendor = sqlx::query_as::<_, RegisteredVendor>(
        "INSERT INTO vendors (name, username, password_hash, canteen_id) \
         VALUES ($1, $2, $3, $4) RETURNING id, username",
    )
    .bind(&payload.name)
    .bind(&payload.username)
    .bind(&password_hash)
    .bind(payload.canteen_id)
    .fetch_one(&state.db)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
            "Username \"{}\" is already taken.",
            payload.username
        )),
        _ => AppError::Database(err),
    })?;

    Ok((StatusCode::CREATED, Json(vendor)))
}

#[derive(Debug, Deserialize)]
pub struct LoginVendor {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, FromRow)]
struct VendorCredentials {
    id: i32,
    password_hash: String,
    canteen_id: i32,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginVendor>,
) -> Result<Json<TokenResponse>, AppError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required.".into(),
        ));
    }

    let vendor = sqlx::query_as::<_, VendorCredentials>(
        "SELECT id, password_hash, canteen_id FROM vendors WHERE username = $1",
    )
    .bind(&payload.username)
    .fetch_optional(&state.db)
    .await?;

    // Unknown usernames and wrong passwords answer identically.
    let Some(vendor) = vendor else {
        return Err(AppError::InvalidCredentials);
    };

    let password = payload.password.clone();
    let hash = vendor.password_hash.clone();
    let valid = spawn_blocking(move || bcrypt::verify(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(vendor.id, vendor.canteen_id, &state.config.jwt_secret)?;

    Ok(Json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = issue_token(7, 3, "test-secret").unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();

        assert_eq!(claims.vendor_id, 7);
        assert_eq!(claims.canteen_id, 3);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(7, 3, "test-secret").unwrap();

        assert!(matches!(
            verify_token(&token, "other-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims {
            vendor_id: 7,
            canteen_id: 3,
            exp: (Utc::now() - Duration::hours(TOKEN_VALIDITY_HOURS + 1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            verify_token(&token, "test-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            verify_token("not-a-token", "test-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_password_hash_round_trip() {
        // Minimum cost keeps the test fast; production uses DEFAULT_COST.
        let hash = bcrypt::hash("hunter2", 4).unwrap();

        assert!(bcrypt::verify("hunter2", &hash).unwrap());
        assert!(!bcrypt::verify("hunter3", &hash).unwrap());
    }
}
