use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_DURATION_SECS: i64 = 30 * 24 * 3600; // 30 days

/// JWT claims carried by an access token. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Verifies bearer tokens (and mints them for tests/tooling). Token
/// issuance proper — sign-in, refresh, external identity — lives in the
/// auth service, not here.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Create a token for a user id.
    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + chrono::Duration::seconds(TOKEN_DURATION_SECS)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify a token and return the authenticated user id.
    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;
        Uuid::parse_str(&claims.sub).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret-key", "folio".to_string())
    }

    #[test]
    fn round_trip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.create_token(user_id).unwrap();
        assert_eq!(svc.verify_token(&token).unwrap(), user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = service().create_token(Uuid::new_v4()).unwrap();
        let other = JwtService::new("other-secret", "folio".to_string());
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let token = JwtService::new("test-secret-key", "someone-else".to_string())
            .create_token(Uuid::new_v4())
            .unwrap();
        assert!(service().verify_token(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(service().verify_token("not.a.token").is_err());
    }
}
