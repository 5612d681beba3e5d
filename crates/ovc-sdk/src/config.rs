//! Client configuration
//!
//! Credentials are either an itsyou.online client id and secret, or a JWT
//! obtained beforehand; never both.

use crate::error::{OvcError, Result};
use crate::identity::ITSYOU_ONLINE_URL;
use crate::jwt::IYO_PUBLIC_KEY;
use crate::limiter::DEFAULT_CONCURRENT_REQUESTS;
use crate::retry::RetryConfig;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const ENV_SERVER_URL: &str = "OPENVCLOUD_SERVER_URL";
pub const ENV_CLIENT_ID: &str = "ITSYOU_ONLINE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ITSYOU_ONLINE_CLIENT_SECRET";
pub const ENV_CLIENT_JWT: &str = "ITSYOU_ONLINE_CLIENT_JWT";
pub const ENV_CONCURRENT_REQUESTS: &str = "G8_API_CONCURRENT_REQUESTS";

/// Configuration used to connect to the API
#[derive(Debug, Clone)]
pub struct Config {
    /// G8 base URL, without the `/restmachine` suffix
    pub url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub jwt: Option<String>,

    /// itsyou.online base URL
    pub identity_url: String,

    /// PEM encoded EC key JWTs must be signed with
    pub jwt_public_key: String,

    /// Maximum number of simultaneous HTTP requests to the G8
    pub concurrent_requests: usize,

    pub timing: Timing,
}

impl Config {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: None,
            client_secret: None,
            jwt: None,
            identity_url: ITSYOU_ONLINE_URL.to_string(),
            jwt_public_key: IYO_PUBLIC_KEY.to_string(),
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            timing: Timing::default(),
        }
    }

    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    /// Create Config from environment variables
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ENV_SERVER_URL)
            .map_err(|_| OvcError::MissingEnvVar(ENV_SERVER_URL.to_string()))?;

        let mut config = Self::new(url);
        config.client_id = non_empty_var(ENV_CLIENT_ID);
        config.client_secret = non_empty_var(ENV_CLIENT_SECRET);
        config.jwt = non_empty_var(ENV_CLIENT_JWT);

        if let Some(limit) = non_empty_var(ENV_CONCURRENT_REQUESTS) {
            config.concurrent_requests = limit.trim().parse().map_err(|_| {
                OvcError::InvalidConfig(format!(
                    "{} must be an integer, got {:?}",
                    ENV_CONCURRENT_REQUESTS, limit
                ))
            })?;
        }

        Ok(config)
    }

    /// Check the credential combination and limits
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(OvcError::InvalidConfig("server URL is empty".to_string()));
        }

        let has_id_secret = self.client_id.is_some() && self.client_secret.is_some();
        if has_id_secret && self.jwt.is_some() {
            return Err(OvcError::InvalidConfig(
                "ClientID, ClientSecret and JWT are provided, please only set ClientID and ClientSecret or JWT"
                    .to_string(),
            ));
        }
        if self.jwt.is_none() && !has_id_secret {
            return Err(OvcError::InvalidConfig(
                "no credentials were provided".to_string(),
            ));
        }

        if self.concurrent_requests == 0 {
            return Err(OvcError::InvalidConfig(
                "concurrent request limit must be at least 1".to_string(),
            ));
        }
        if self.concurrent_requests > Semaphore::MAX_PERMITS {
            return Err(OvcError::InvalidConfig(format!(
                "concurrent request limit must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Delays and retry budgets of the dispatcher and the task poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Submission answered with 429 or the proxy's spurious 400
    pub submit_retry: RetryConfig,

    /// Submission failed at the transport level
    pub transport_retry: RetryConfig,

    /// Pause between task status polls, also used after transient poll answers
    pub poll_interval: Duration,

    /// Status poll failed at the transport level
    pub poll_transport_retry: RetryConfig,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            submit_retry: RetryConfig::linear(Duration::from_secs(1), None),
            transport_retry: RetryConfig::linear(Duration::from_secs(1), Some(20)),
            poll_interval: Duration::from_secs(2),
            poll_transport_retry: RetryConfig::fixed(Duration::from_secs(2), Some(20)),
        }
    }
}

impl Timing {
    /// Same retry shape with every delay scaled down to `unit` per second
    pub fn scaled(unit: Duration) -> Self {
        Self {
            submit_retry: RetryConfig::linear(unit, None),
            transport_retry: RetryConfig::linear(unit, Some(20)),
            poll_interval: unit * 2,
            poll_transport_retry: RetryConfig::fixed(unit * 2, Some(20)),
        }
    }
}
