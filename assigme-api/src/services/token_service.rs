use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use uuid::Uuid;

use assigme_shared::errors::AppError;
use assigme_shared::types::auth::Claims;

/// Sign a short-lived access token carrying the user id and email.
pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, email, ttl_secs);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
}

/// Opaque room identifier for a call-signaling session.
pub fn generate_room_id(conversation_id: Uuid) -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    format!("call_{}_{}", conversation_id.simple(), hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[test]
    fn token_carries_id_and_email() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "a@b.fr", "secret", 3600).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, user_id);
        assert_eq!(decoded.claims.email, "a@b.fr");
    }

    #[test]
    fn room_ids_are_unique_per_call() {
        let conv = Uuid::new_v4();
        let a = generate_room_id(conv);
        let b = generate_room_id(conv);
        assert!(a.starts_with("call_"));
        assert_ne!(a, b);
    }
}
