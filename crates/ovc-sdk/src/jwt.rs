//! itsyou.online JWT handling
//!
//! [`TokenManager`] owns the bearer token used for every G8 call. A token
//! that is within [`EXPIRATION_BUFFER`] of its `exp` claim is refreshed
//! before use, provided the originally issued token carried a
//! `refresh_token` claim. Refreshing always presents the original token and
//! replaces the current one as a whole, so readers never observe a partial
//! update.

use crate::error::{OvcError, Result};
use crate::identity::ItsYouOnline;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Public key itsyou.online signs its ES384 tokens with
pub const IYO_PUBLIC_KEY: &str = "-----BEGIN PUBLIC KEY-----
MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAES5X8XrfKdx9gYayFITc89wad4usrk0n2
7MjiGYvqalizeSWTHEpnd7oea9IQ8T5oJjMVH5cc0H5tFSKilFFeh//wngxIyny6
6+Vq5t5B0V0Ehy01+2ceEon2Y0XDkIKv
-----END PUBLIC KEY-----
";

/// Tokens this close to expiry are refreshed before use (seconds)
pub const EXPIRATION_BUFFER: i64 = 5 * 60;

/// Parse a PEM encoded EC public key into a verification key
pub fn decoding_key(pem: &str) -> Result<DecodingKey> {
    DecodingKey::from_ec_pem(pem.as_bytes())
        .map_err(|e| OvcError::InvalidConfig(format!("Failed to parse JWT public key: {}", e)))
}

/// A verified JWT and the claims the client relies on
#[derive(Debug, Clone)]
pub struct Token {
    raw: String,
    username: String,
    expires_at: i64,
    refreshable: bool,
    claims: Map<String, Value>,
}

impl Token {
    /// Verify `raw` against `key` and extract its claims
    ///
    /// Only ES384 signatures are accepted. Expiry is not checked here; see
    /// [`Token::needs_refresh`].
    pub fn parse(raw: &str, key: &DecodingKey) -> Result<Self> {
        tracing::debug!("Parsing JWT");
        let raw = raw.trim();

        let mut validation = Validation::new(Algorithm::ES384);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Map<String, Value>>(raw, key, &validation)
            .map_err(|e| OvcError::MalformedCredential(e.to_string()))?;
        let claims = data.claims;

        let username = claims
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OvcError::MalformedCredential("Username not in JWT claims".to_string())
            })?
            .to_string();

        let expires_at = claims
            .get("exp")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                OvcError::MalformedCredential("invalid expiration claim in token".to_string())
            })? as i64;

        let refreshable = claims.contains_key("refresh_token");

        Ok(Self {
            raw: raw.to_string(),
            username,
            expires_at,
            refreshable,
            claims,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expiry as epoch seconds
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the token carries a `refresh_token` claim
    pub fn is_refreshable(&self) -> bool {
        self.refreshable
    }

    /// Look up an arbitrary claim
    pub fn claim(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    /// Whether the token is expired or within the grace buffer at `now`
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - now <= EXPIRATION_BUFFER
    }
}

/// Owner of the bearer token used for API calls
pub struct TokenManager {
    original: Token,
    current: RwLock<Arc<Token>>,
    key: DecodingKey,
    identity: ItsYouOnline,
}

impl TokenManager {
    pub fn new(raw: &str, key: DecodingKey, identity: ItsYouOnline) -> Result<Self> {
        let original = Token::parse(raw, &key)?;
        tracing::debug!(
            "Loaded JWT for {} (refreshable: {})",
            original.username(),
            original.is_refreshable()
        );
        Ok(Self {
            current: RwLock::new(Arc::new(original.clone())),
            original,
            key,
            identity,
        })
    }

    /// Return a token string valid beyond the grace buffer
    pub async fn get(&self) -> Result<String> {
        {
            let current = self.current.read().await;
            if !current.needs_refresh(now()) {
                return Ok(current.raw().to_string());
            }
        }

        let mut current = self.current.write().await;
        // Another caller may have refreshed while we waited for the write lock.
        if !current.needs_refresh(now()) {
            return Ok(current.raw().to_string());
        }

        if !self.original.is_refreshable() {
            tracing::error!("JWT for {} is expired", self.original.username());
            return Err(OvcError::ExpiredCredential);
        }

        tracing::debug!("Refreshing JWT for {}", self.original.username());
        let refreshed = self.identity.refresh_jwt(self.original.raw()).await?;
        let token = Token::parse(&refreshed, &self.key).map_err(|e| {
            OvcError::MalformedCredential(format!(
                "Something went wrong parsing the refreshed JWT: {}",
                e
            ))
        })?;

        *current = Arc::new(token);
        Ok(current.raw().to_string())
    }

    /// The token the manager was created with
    pub fn original(&self) -> &Token {
        &self.original
    }

    pub fn username(&self) -> &str {
        self.original.username()
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("username", &self.original.username())
            .field("refreshable", &self.original.is_refreshable())
            .finish()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
