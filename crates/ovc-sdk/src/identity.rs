//! itsyou.online identity provider calls

use crate::error::{OvcError, Result};

/// Base URL of the itsyou.online identity provider
pub const ITSYOU_ONLINE_URL: &str = "https://itsyou.online";

const ACCESS_TOKEN_PATH: &str = "/v1/oauth/access_token";
const REFRESH_PATH: &str = "/v1/oauth/jwt/refresh";

/// Client for the itsyou.online OAuth endpoints
#[derive(Debug, Clone)]
pub struct ItsYouOnline {
    http: reqwest::Client,
    base_url: String,
}

impl ItsYouOnline {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Obtain a JWT with the client-credentials grant
    pub async fn fetch_jwt(&self, client_id: &str, client_secret: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, ACCESS_TOKEN_PATH);
        tracing::debug!("Fetching JWT from {}", url);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("response_type", "id_token"),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| OvcError::IdentityProvider(format!("Error fetching JWT: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OvcError::IdentityProvider(format!("Error reading JWT body: {}", e)))?;

        if status != reqwest::StatusCode::OK {
            return Err(OvcError::IdentityProvider(format!(
                "Failed to fetch JWT: {}",
                body
            )));
        }

        Ok(body)
    }

    /// Exchange `token` for a refreshed JWT
    ///
    /// `token` must be the originally issued JWT, not an earlier refresh.
    pub async fn refresh_jwt(&self, token: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        tracing::debug!("Refreshing JWT at {}", url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("bearer {}", token))
            .send()
            .await
            .map_err(|e| OvcError::IdentityProvider(format!("Error refreshing JWT: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OvcError::IdentityProvider(format!(
                "Something went wrong refreshing the JWT: {}",
                body
            )));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_jwt_posts_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/access_token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=my-id"))
            .and(body_string_contains("client_secret=my-secret"))
            .and(body_string_contains("response_type=id_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("the.jwt.token"))
            .expect(1)
            .mount(&server)
            .await;

        let iyo = ItsYouOnline::new(reqwest::Client::new(), server.uri());
        let jwt = iyo.fetch_jwt("my-id", "my-secret").await.unwrap();
        assert_eq!(jwt, "the.jwt.token");
    }

    #[tokio::test]
    async fn test_fetch_jwt_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/access_token"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad secret"))
            .mount(&server)
            .await;

        let iyo = ItsYouOnline::new(reqwest::Client::new(), server.uri());
        let err = iyo.fetch_jwt("id", "secret").await.unwrap_err();
        match err {
            OvcError::IdentityProvider(msg) => assert!(msg.contains("bad secret")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/oauth/jwt/refresh"))
            .and(header("authorization", "bearer original.jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh.jwt"))
            .expect(1)
            .mount(&server)
            .await;

        let iyo = ItsYouOnline::new(reqwest::Client::new(), format!("{}/", server.uri()));
        assert_eq!(iyo.refresh_jwt("original.jwt").await.unwrap(), "fresh.jwt");
    }
}
