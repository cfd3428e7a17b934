use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::Claims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("authorization is required")]
    Missing,

    #[error("authorization header is not a bearer token")]
    NotBearer,

    #[error("invalid verification key: {0}")]
    InvalidKey(String),

    #[error("token signature is invalid")]
    Signature,

    #[error("token has expired")]
    Expired,

    #[error("token issuer does not match")]
    Issuer,

    #[error("token audience does not match")]
    Audience,

    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::Signature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidIssuer => Self::Issuer,
            ErrorKind::InvalidAudience => Self::Audience,
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => Self::Issuer,
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => Self::Audience,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

/// "Is this caller authorized" check consumed by the product consumer.
pub trait TokenValidator: Send + Sync {
    /// Verify a bare token (no `Bearer ` prefix).
    fn validate(&self, token: &str) -> Result<Claims, TokenError>;

    /// Verify a raw `Authorization` header value.
    fn validate_header(&self, header: Option<&str>) -> Result<Claims, TokenError> {
        let token = bearer_token(header.ok_or(TokenError::Missing)?)?;
        self.validate(token)
    }
}

/// Strip the `Bearer ` scheme from an `Authorization` value.
pub fn bearer_token(header: &str) -> Result<&str, TokenError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(TokenError::NotBearer)?
        .trim();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

/// JWT validator checking signature, issuer and audience (and `exp` when the
/// token carries one).
pub struct JwtTokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenValidator {
    /// RS256 with a PEM-encoded public key.
    pub fn rs256_pem(pem: &[u8], issuer: &str, audience: &str) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        Ok(Self::with_key(key, Algorithm::RS256, issuer, audience))
    }

    /// RS256 with a PEM public key that is itself base64-encoded (the form
    /// used by the `PUBLIC_KEY` environment variable).
    pub fn rs256_base64_pem(encoded: &str, issuer: &str, audience: &str) -> Result<Self, TokenError> {
        let pem = STANDARD
            .decode(encoded.trim())
            .map_err(|e| TokenError::InvalidKey(format!("public key is not base64: {e}")))?;
        Self::rs256_pem(&pem, issuer, audience)
    }

    /// HS256 with a shared secret.
    pub fn hs256(secret: &[u8], issuer: &str, audience: &str) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256, issuer, audience)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        Self { key, validation }
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for JwtTokenValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtTokenValidator")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";

    fn mint(claims: serde_json::Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
            .expect("failed to encode jwt")
    }

    fn validator() -> JwtTokenValidator {
        JwtTokenValidator::hs256(SECRET, "catalog-issuer", "catalog")
    }

    #[test]
    fn valid_token_yields_claims() {
        let token = mint(json!({"sub": "u1", "iss": "catalog-issuer", "aud": "catalog"}), SECRET);
        let claims = validator().validate(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u1"));
    }

    #[test]
    fn header_form_requires_bearer_scheme() {
        let token = mint(json!({"iss": "catalog-issuer", "aud": "catalog"}), SECRET);
        let v = validator();

        assert!(v.validate_header(Some(&format!("Bearer {token}"))).is_ok());
        assert_eq!(v.validate_header(None), Err(TokenError::Missing));
        assert_eq!(v.validate_header(Some(&token)), Err(TokenError::NotBearer));
        assert_eq!(v.validate_header(Some("Bearer   ")), Err(TokenError::Missing));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let v = validator();
        let token = mint(json!({"iss": "someone-else", "aud": "catalog"}), SECRET);
        assert_eq!(v.validate(&token), Err(TokenError::Issuer));

        let token = mint(json!({"iss": "catalog-issuer", "aud": "billing"}), SECRET);
        assert_eq!(v.validate(&token), Err(TokenError::Audience));

        let token = mint(json!({"aud": "catalog"}), SECRET);
        assert_eq!(v.validate(&token), Err(TokenError::Issuer));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let token = mint(json!({"iss": "catalog-issuer", "aud": "catalog"}), b"other-secret");
        assert_eq!(validator().validate(&token), Err(TokenError::Signature));
        assert!(matches!(validator().validate("not.a.jwt"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = mint(json!({"iss": "catalog-issuer", "aud": "catalog", "exp": exp}), SECRET);
        assert_eq!(validator().validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn bad_base64_key_is_reported() {
        assert!(matches!(
            JwtTokenValidator::rs256_base64_pem("%%%", "i", "a"),
            Err(TokenError::InvalidKey(_))
        ));
    }
}
