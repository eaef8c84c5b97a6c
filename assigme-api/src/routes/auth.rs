use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::auth::{AccountType, AuthUser};
use assigme_shared::types::ApiResponse;

use crate::models::{NewUser, User};
use crate::schema::users;
use crate::services::{auth_service, token_service};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 100, message = "nom complet entre 3 et 100 caractères"))]
    pub full_name: String,
    #[validate(email(message = "format d'email invalide"))]
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// 6 to 20 characters out of digits, +, parentheses, spaces and dashes.
fn is_valid_phone(phone: &str) -> bool {
    (6..=20).contains(&phone.len())
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | ' ' | '-'))
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: uuid::Uuid,
    pub full_name: String,
    pub email: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisteredUser>>)> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    if !is_valid_phone(&req.phone) {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "numéro de téléphone invalide",
        ));
    }
    auth_service::validate_password(&req.password)?;

    let email = req.email.trim().to_lowercase();
    let password_hash = auth_service::hash_password(&req.password)?;

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    // Deterministic pre-check; the unique index on email closes the race.
    let exists: bool = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result::<i64>(&mut conn)
        .map(|c| c > 0)
        .unwrap_or(false);

    if exists {
        return Err(AppError::new(
            ErrorCode::EmailAlreadyExists,
            "cet email est déjà inscrit",
        ));
    }

    let new_user = NewUser {
        full_name: req.full_name,
        email,
        phone: req.phone,
        password_hash,
        account_type: AccountType::Particulier.to_string(),
    };

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::new(ErrorCode::EmailAlreadyExists, "cet email est déjà inscrit")
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            RegisteredUser {
                id: user.id,
                full_name: user.full_name,
                email: user.email,
            },
            "inscription réussie",
        )),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/auth/login
///
/// Failed attempts are counted per email over a fixed window; once the
/// budget is spent every further attempt gets the same 429 regardless
/// of credentials. Successful logins do not count against the window.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let email = req.email.trim().to_lowercase();
    let fail_key = format!("login_fail:{email}");

    let failures = state
        .redis
        .fixed_window_count(&fail_key)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;
    if failures >= state.config.login_max_failures {
        return Err(AppError::new(
            ErrorCode::RateLimited,
            "trop de tentatives de connexion, veuillez réessayer plus tard",
        ));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?;

    let Some(user) = user else {
        record_failure(&state, &fail_key).await;
        return Err(AppError::new(ErrorCode::UserNotFound, "utilisateur non trouvé"));
    };

    let valid = auth_service::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        record_failure(&state, &fail_key).await;
        return Err(AppError::new(
            ErrorCode::InvalidCredentials,
            "mot de passe incorrect",
        ));
    }

    let token = token_service::create_access_token(
        user.id,
        &user.email,
        &state.config.jwt_secret,
        state.config.jwt_ttl_secs,
    )?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(ApiResponse::ok_with_message(
        LoginResponse { token },
        "connexion réussie",
    )))
}

async fn record_failure(state: &AppState, fail_key: &str) {
    if let Err(e) = state
        .redis
        .fixed_window_incr(fail_key, state.config.login_window_secs)
        .await
    {
        tracing::warn!(error = %e, "failed to record login failure");
    }
}

/// GET /api/auth/profile
pub async fn profile(user: AuthUser) -> Json<ApiResponse<AuthUser>> {
    Json(ApiResponse::ok(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone("+33 6 12 34 56 78"));
        assert!(is_valid_phone("(01) 23-45-67"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("abc123456"));
    }
}
