use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::OnceLock;

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = validate_jwt(&token)?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AppError::new(
            ErrorCode::Unauthorized,
            "authorization header must use Bearer scheme",
        ));
    }

    Ok(auth_header[7..].to_string())
}

static JWT_SECRET: OnceLock<String> = OnceLock::new();

/// Install the verification secret at startup so tokens are checked
/// against the same secret they were signed with. The first caller
/// wins; later calls are ignored.
pub fn set_jwt_secret(secret: impl Into<String>) {
    let _ = JWT_SECRET.set(secret.into());
}

fn jwt_secret() -> String {
    if let Some(secret) = JWT_SECRET.get() {
        return secret.clone();
    }
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "development-secret-change-in-production".to_string())
}

fn validate_jwt(token: &str) -> Result<Claims, AppError> {
    validate_with_secret(token, &jwt_secret())
}

fn validate_with_secret(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic dXNlcg==".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn valid_token_round_trips_claims() {
        let secret = "development-secret-change-in-production";
        let claims = Claims::new(Uuid::new_v4(), "a@b.fr", 3600);
        let token = sign(&claims, secret);

        let decoded = validate_with_secret(&token, secret).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.email, "a@b.fr");
    }

    #[test]
    fn configured_secret_verifies_its_own_tokens() {
        // Tokens signed with a deployment-specific secret validate
        // against that same secret, not the development default.
        let secret = "une-cle-de-production";
        let claims = Claims::new(Uuid::new_v4(), "a@b.fr", 3600);
        let token = sign(&claims, secret);

        assert!(validate_with_secret(&token, secret).is_ok());
        assert!(
            validate_with_secret(&token, "development-secret-change-in-production").is_err()
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "a@b.fr", 3600);
        let token = sign(&claims, "some-other-secret");
        assert!(validate_with_secret(&token, "development-secret-change-in-production").is_err());
    }
}
