use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Annonce errors
/// - E3xxx: Favoris errors
/// - E4xxx: Conversation/messaging errors
/// - E5xxx: Image errors
/// - E6xxx: Call-signaling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    BadRequest,
    PayloadTooLarge,

    // Auth (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    TokenExpired,
    TokenInvalid,
    UserNotFound,

    // Annonces (E2xxx)
    AnnonceNotFound,
    NotAnnonceOwner,

    // Favoris (E3xxx)
    FavoriAlreadyExists,
    FavoriNotFound,

    // Conversations (E4xxx)
    ConversationNotFound,
    NotConversationParticipant,
    ConversationAlreadyExists,
    SelfConversation,
    EmptyMessage,
    InvalidConversationStatus,

    // Images (E5xxx)
    ImageNotFound,
    TooManyImages,
    InvalidImageOrder,
    UnsupportedImageFormat,
    ImageTooLarge,
    NoImageProvided,

    // Calls (E6xxx)
    CallNotFound,
    NotCallReceiver,
    NotCallParticipant,
    InvalidCallAction,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::BadRequest => "E0007",
            Self::PayloadTooLarge => "E0008",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::TokenExpired => "E1003",
            Self::TokenInvalid => "E1004",
            Self::UserNotFound => "E1005",

            // Annonces
            Self::AnnonceNotFound => "E2001",
            Self::NotAnnonceOwner => "E2002",

            // Favoris
            Self::FavoriAlreadyExists => "E3001",
            Self::FavoriNotFound => "E3002",

            // Conversations
            Self::ConversationNotFound => "E4001",
            Self::NotConversationParticipant => "E4002",
            Self::ConversationAlreadyExists => "E4003",
            Self::SelfConversation => "E4004",
            Self::EmptyMessage => "E4005",
            Self::InvalidConversationStatus => "E4006",

            // Images
            Self::ImageNotFound => "E5001",
            Self::TooManyImages => "E5002",
            Self::InvalidImageOrder => "E5003",
            Self::UnsupportedImageFormat => "E5004",
            Self::ImageTooLarge => "E5005",
            Self::NoImageProvided => "E5006",

            // Calls
            Self::CallNotFound => "E6001",
            Self::NotCallReceiver => "E6002",
            Self::NotCallParticipant => "E6003",
            Self::InvalidCallAction => "E6004",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError
            | Self::BadRequest
            | Self::SelfConversation
            | Self::EmptyMessage
            | Self::InvalidConversationStatus
            | Self::TooManyImages
            | Self::InvalidImageOrder
            | Self::UnsupportedImageFormat
            | Self::ImageTooLarge
            | Self::NoImageProvided
            | Self::InvalidCallAction => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound
            | Self::UserNotFound
            | Self::AnnonceNotFound
            | Self::FavoriNotFound
            | Self::ConversationNotFound
            | Self::ImageNotFound
            | Self::CallNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden
            | Self::NotAnnonceOwner
            | Self::NotConversationParticipant
            | Self::NotCallReceiver
            | Self::NotCallParticipant => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::EmailAlreadyExists
            | Self::FavoriAlreadyExists
            | Self::ConversationAlreadyExists => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// True when the underlying diesel error is a unique-key violation.
    /// Used to translate constraint hits on favoris/conversations/users
    /// into deterministic conflict responses.
    pub fn is_unique_violation(err: &diesel::result::Error) -> bool {
        matches!(
            err,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known {
                code,
                message,
                details,
            } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let json = body_json(AppError::new(
            ErrorCode::AnnonceNotFound,
            "annonce introuvable",
        ))
        .await;

        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "E2001");
        assert_eq!(json["error"]["message"], "annonce introuvable");
    }

    #[tokio::test]
    async fn ownership_maps_to_forbidden() {
        let response =
            AppError::new(ErrorCode::NotAnnonceOwner, "not yours").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn duplicates_map_to_conflict() {
        for code in [
            ErrorCode::EmailAlreadyExists,
            ErrorCode::FavoriAlreadyExists,
            ErrorCode::ConversationAlreadyExists,
        ] {
            assert_eq!(code.status_code(), StatusCode::CONFLICT);
        }
    }

    #[tokio::test]
    async fn details_are_carried() {
        let json = body_json(AppError::with_details(
            ErrorCode::ConversationAlreadyExists,
            "une conversation existe déjà",
            serde_json::json!({ "conversationId": "abc" }),
        ))
        .await;

        assert_eq!(json["error"]["details"]["conversationId"], "abc");
    }

    #[tokio::test]
    async fn rate_limited_is_429() {
        let response = AppError::new(ErrorCode::RateLimited, "trop de tentatives")
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn diesel_not_found_is_not_unique_violation() {
        assert!(!AppError::is_unique_violation(
            &diesel::result::Error::NotFound
        ));
    }
}
