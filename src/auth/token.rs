use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Lifetime of a refresh token.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid signing method: {0}")]
    InvalidSignatureMethod(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub username: String,
    /// User id of the token owner
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
    pub is_anonymous: bool,
    /// Unique per issued token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub token_type: TokenType,
}

/// Access and refresh token from a single issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// Signs and verifies HMAC bearer tokens. Holds no state besides the keys.
pub struct TokenCodec {
    access: Keys,
    refresh: Keys,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Result<Self, TokenError> {
        Ok(Self {
            access: Keys::from_secret(&config.secret)?,
            refresh: Keys::from_secret(config.refresh_secret())?,
        })
    }

    pub fn issue_access_token(
        &self,
        username: &str,
        subject: i64,
        is_anonymous: bool,
    ) -> Result<String, TokenError> {
        self.issue_access_token_at(username, subject, is_anonymous, Utc::now().timestamp())
    }

    pub fn issue_refresh_token(
        &self,
        username: &str,
        subject: i64,
        is_anonymous: bool,
    ) -> Result<String, TokenError> {
        self.issue_refresh_token_at(username, subject, is_anonymous, Utc::now().timestamp())
    }

    pub fn issue_pair(
        &self,
        username: &str,
        subject: i64,
        is_anonymous: bool,
    ) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access_token: self.issue_access_token_at(username, subject, is_anonymous, now)?,
            refresh_token: self.issue_refresh_token_at(username, subject, is_anonymous, now)?,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_access_token_at(token, Utc::now().timestamp())
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_refresh_token_at(token, Utc::now().timestamp())
    }

    pub(crate) fn issue_access_token_at(
        &self,
        username: &str,
        subject: i64,
        is_anonymous: bool,
        now: i64,
    ) -> Result<String, TokenError> {
        // Access tokens get a jti too: the sessions table keeps access_token
        // unique, and two pairs can be issued within the same second.
        let payload = TokenPayload {
            username: username.to_string(),
            sub: subject,
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECS,
            is_anonymous,
            jti: Some(Uuid::new_v4().to_string()),
            token_type: TokenType::Access,
        };
        sign(&payload, &self.access.encoding)
    }

    pub(crate) fn issue_refresh_token_at(
        &self,
        username: &str,
        subject: i64,
        is_anonymous: bool,
        now: i64,
    ) -> Result<String, TokenError> {
        let payload = TokenPayload {
            username: username.to_string(),
            sub: subject,
            iat: now,
            exp: now + REFRESH_TOKEN_TTL_SECS,
            is_anonymous,
            jti: Some(Uuid::new_v4().to_string()),
            token_type: TokenType::Refresh,
        };
        sign(&payload, &self.refresh.encoding)
    }

    pub(crate) fn verify_access_token_at(&self, token: &str, now: i64) -> Result<TokenPayload, TokenError> {
        verify(token, &self.access.decoding, TokenType::Access, now)
    }

    pub(crate) fn verify_refresh_token_at(&self, token: &str, now: i64) -> Result<TokenPayload, TokenError> {
        verify(token, &self.refresh.decoding, TokenType::Refresh, now)
    }
}

fn sign(payload: &TokenPayload, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(SIGNING_ALGORITHM), payload, key).map_err(|e| TokenError::Signing(e.to_string()))
}

fn verify(token: &str, key: &DecodingKey, expected: TokenType, now: i64) -> Result<TokenPayload, TokenError> {
    let header = decode_header(token).map_err(|e| match e.kind() {
        // A well-formed header naming an algorithm we do not know at all
        ErrorKind::Json(_) if header_declares_alg(token) => {
            TokenError::InvalidSignatureMethod("unsupported algorithm".to_string())
        }
        _ => TokenError::InvalidToken,
    })?;

    if !HMAC_ALGORITHMS.contains(&header.alg) {
        return Err(TokenError::InvalidSignatureMethod(format!("{:?}", header.alg)));
    }

    // Expiry is checked below against the caller's clock, with no leeway.
    let mut validation = Validation::new(header.alg);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.validate_exp = false;
    validation.leeway = 0;

    let payload = decode::<TokenPayload>(token, key, &validation)
        .map_err(|_| TokenError::InvalidToken)?
        .claims;

    if payload.token_type != expected {
        return Err(TokenError::InvalidToken);
    }

    if payload.exp <= now {
        return Err(TokenError::ExpiredToken);
    }

    Ok(payload)
}

/// Whether the first segment is a JSON object with an `alg` string, i.e. the
/// header is structurally fine and only the algorithm failed to parse.
fn header_declares_alg(token: &str) -> bool {
    use base64::Engine as _;

    let Some(first) = token.split('.').next() else {
        return false;
    };
    let Ok(bytes) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(first) else {
        return false;
    };
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .map(|v| v.get("alg").is_some_and(|alg| alg.is_string()))
        .unwrap_or(false)
}
