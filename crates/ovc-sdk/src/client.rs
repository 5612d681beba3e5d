//! G8 API client
//!
//! Every operation is submitted with `"_async": true`, which makes the G8
//! answer with a task id. [`Client::post`] then polls the task until it
//! produces a result, all under one overall deadline. Each individual HTTP
//! request holds a slot of the shared [`RequestLimiter`].

use crate::config::{Config, Timing};
use crate::error::{OvcError, Result};
use crate::identity::ItsYouOnline;
use crate::jwt::{TokenManager, decoding_key};
use crate::limiter::RequestLimiter;
use crate::lock::{ResourceGuard, ResourceLocks};
use crate::request::{AsyncBody, mark_async};
use crate::retry::Deadline;
use crate::task::TaskHandle;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Page served by the G8's nginx front for a spurious 400
///
/// Such a 400 never reached the API and is retried like a 429.
pub const NGINX_BAD_REQUEST_PAGE: &str = "<html>\r\n<head><title>400 Bad Request</title></head>\r\n<body>\r\n<center><h1>400 Bad Request</h1></center>\r\n<hr><center>nginx/1.17.6</center>\r\n</body>\r\n</html>\r\n";

/// Timeout classes for G8 operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTimeout {
    /// Reads and model updates: 1 minute
    Model,
    /// Operations touching hypervisors or storage: 10 minutes
    Operational,
    /// Bulk data movement such as image uploads: 24 hours
    Data,
}

impl ResponseTimeout {
    pub fn duration(self) -> Duration {
        match self {
            ResponseTimeout::Model => Duration::from_secs(60),
            ResponseTimeout::Operational => Duration::from_secs(10 * 60),
            ResponseTimeout::Data => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl From<ResponseTimeout> for Duration {
    fn from(timeout: ResponseTimeout) -> Self {
        timeout.duration()
    }
}

/// Status and body of a single HTTP exchange
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: reqwest::StatusCode,
    pub body: Vec<u8>,
}

/// How a submission answer is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitDisposition {
    Accepted,
    Unauthorized,
    Transient,
    Failed,
}

fn classify_submission(status: u16, body: &[u8]) -> SubmitDisposition {
    match status {
        401 => SubmitDisposition::Unauthorized,
        400 if is_proxy_bad_request(body) => SubmitDisposition::Transient,
        429 => SubmitDisposition::Transient,
        s if s > 202 => SubmitDisposition::Failed,
        _ => SubmitDisposition::Accepted,
    }
}

/// Whether a 400 body is the nginx error page rather than an API answer
///
/// Matched on the page's title and server footer so nginx version and line
/// ending changes still count.
fn is_proxy_bad_request(body: &[u8]) -> bool {
    if body == NGINX_BAD_REQUEST_PAGE.as_bytes() {
        return true;
    }
    let text = String::from_utf8_lossy(body);
    text.contains("<title>400 Bad Request</title>") && text.contains("<center>nginx")
}

struct ClientInner {
    http: reqwest::Client,
    server_url: String,
    access: String,
    token: TokenManager,
    limiter: RequestLimiter,
    locks: ResourceLocks,
    timing: Timing,
}

/// Handle to one G8, cheap to clone
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Connect to the G8 described by `config`
    ///
    /// Without a JWT in the config, one is fetched from itsyou.online with
    /// the client credentials first.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::new();
        let identity = ItsYouOnline::new(http.clone(), config.identity_url.as_str());

        let raw = match (&config.jwt, &config.client_id, &config.client_secret) {
            (Some(jwt), _, _) => jwt.clone(),
            (None, Some(id), Some(secret)) => identity.fetch_jwt(id, secret).await?,
            _ => {
                return Err(OvcError::InvalidConfig(
                    "no credentials were provided".to_string(),
                ));
            }
        };

        let key = decoding_key(&config.jwt_public_key)?;
        let token = TokenManager::new(&raw, key, identity)?;

        let server_url = format!("{}/restmachine", config.url.trim_end_matches('/'));
        let access = format!("{}@itsyouonline", token.username());
        tracing::info!(
            "OVC client for {} at {} ({} concurrent requests)",
            access,
            server_url,
            config.concurrent_requests
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                server_url,
                access,
                token,
                limiter: RequestLimiter::new(config.concurrent_requests),
                locks: ResourceLocks::new(),
                timing: config.timing,
            }),
        })
    }

    /// Create a client from environment variables
    pub async fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?).await
    }

    /// Identity the client acts as, `<username>@itsyouonline`
    pub fn access(&self) -> &str {
        &self.inner.access
    }

    /// G8 base URL including the `/restmachine` suffix
    pub fn server_url(&self) -> &str {
        &self.inner.server_url
    }

    /// Location code of the G8: the first label of the server host name
    pub fn location(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.inner.server_url)
            .map_err(|e| OvcError::InvalidConfig(format!("invalid server URL: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| OvcError::InvalidConfig("server URL has no host".to_string()))?;
        Ok(host.split('.').next().unwrap_or(host).to_string())
    }

    pub fn token(&self) -> &TokenManager {
        &self.inner.token
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.inner.limiter
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.inner.locks
    }

    /// Serialize work on one machine with other users of this client
    pub async fn lock_resource(&self, id: i64) -> ResourceGuard {
        self.inner.locks.acquire(id).await
    }

    pub(crate) fn timing(&self) -> Timing {
        self.inner.timing
    }

    pub(crate) fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.inner.server_url, endpoint)
    }

    /// Call `endpoint` with a typed body and return the task result
    ///
    /// `body` must serialize to a JSON object; `_async` is added to it.
    pub async fn post<T>(
        &self,
        endpoint: &str,
        body: &T,
        timeout: impl Into<Duration>,
    ) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let payload = AsyncBody::new(body).to_vec()?;
        self.execute(Method::POST, endpoint, payload, timeout.into())
            .await
    }

    /// Call `endpoint` with an already encoded JSON object, or no body
    pub async fn post_raw(
        &self,
        endpoint: &str,
        body: Option<&[u8]>,
        timeout: impl Into<Duration>,
    ) -> Result<Vec<u8>> {
        let payload = mark_async(body)?;
        self.execute(Method::POST, endpoint, payload, timeout.into())
            .await
    }

    /// Like [`Client::post`], decoding the task result into `R`
    pub async fn post_json<T, R>(
        &self,
        endpoint: &str,
        body: &T,
        timeout: impl Into<Duration>,
    ) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let result = self.post(endpoint, body, timeout).await?;
        Ok(serde_json::from_slice(&result)?)
    }

    /// Submit `payload` and wait for its task, both within `timeout`
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let deadline = Deadline::after(timeout);
        let url = self.endpoint_url(endpoint);
        let task = self.submit(&method, &url, &payload, &deadline).await?;
        self.wait_for_task(&task, &deadline).await
    }

    async fn submit(
        &self,
        method: &Method,
        url: &str,
        payload: &[u8],
        deadline: &Deadline,
    ) -> Result<TaskHandle> {
        let timing = self.timing();
        let mut transient_retry = timing.submit_retry.start();
        let mut transport_retry = timing.transport_retry.start();

        loop {
            if deadline.expired() {
                return Err(OvcError::Timeout(url.to_string()));
            }

            let RawResponse { status, body } =
                match self.send(method.clone(), url, payload, deadline).await {
                    Ok(response) => response,
                    Err(OvcError::Http(e)) => {
                        tracing::error!("Error doing G8 Api request: {}", e);
                        match transport_retry.next_delay() {
                            Some(delay) => {
                                deadline.sleep(delay).await;
                                continue;
                            }
                            None => return Err(OvcError::Http(e)),
                        }
                    }
                    Err(e) => return Err(e),
                };

            tracing::debug!(
                "OVC call: {} {} status: {} response: {}",
                method,
                url,
                status,
                String::from_utf8_lossy(&body)
            );

            match classify_submission(status.as_u16(), &body) {
                SubmitDisposition::Accepted => return Ok(TaskHandle::from_response(&body)),
                SubmitDisposition::Unauthorized => return Err(OvcError::Authentication),
                SubmitDisposition::Transient => match transient_retry.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            "Received {} from {}, retrying in {:?}",
                            status,
                            url,
                            delay
                        );
                        deadline.sleep(delay).await;
                    }
                    None => {
                        return Err(OvcError::RequestFailed {
                            status: status.as_u16(),
                            body: String::from_utf8_lossy(&body).into_owned(),
                        });
                    }
                },
                SubmitDisposition::Failed => {
                    return Err(OvcError::RequestFailed {
                        status: status.as_u16(),
                        body: String::from_utf8_lossy(&body).into_owned(),
                    });
                }
            }
        }
    }

    /// One HTTP exchange holding a limiter slot, cut off at `deadline`
    ///
    /// Transport failures come back as [`OvcError::Http`].
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        body: &[u8],
        deadline: &Deadline,
    ) -> Result<RawResponse> {
        let exchange = async {
            let _permit = self.inner.limiter.begin().await;
            let token = self.inner.token.get().await?;

            let response = self
                .inner
                .http
                .request(method, url)
                .header(AUTHORIZATION, format!("bearer {}", token))
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec())
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<_, OvcError>(RawResponse { status, body })
        };

        tokio::time::timeout_at(deadline.instant(), exchange)
            .await
            .map_err(|_| OvcError::Timeout(url.to_string()))?
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_url", &self.inner.server_url)
            .field("access", &self.inner.access)
            .field("concurrent_requests", &self.inner.limiter.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_PUBLIC_KEY, mint_token};
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> Client {
        let mut config = Config::new(server.uri()).with_jwt(mint_token("alice", 3600, false));
        config.jwt_public_key = TEST_PUBLIC_KEY.to_string();
        config.identity_url = server.uri();
        config.timing = Timing::scaled(Duration::from_millis(5));
        Client::new(config).await.unwrap()
    }

    async fn mount_task_result(server: &MockServer, result: Value) {
        Mock::given(method("POST"))
            .and(path("/restmachine/system/task/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result))
            .mount(server)
            .await;
    }

    #[test]
    fn test_response_timeout_durations() {
        assert_eq!(Duration::from(ResponseTimeout::Model), Duration::from_secs(60));
        assert_eq!(
            Duration::from(ResponseTimeout::Operational),
            Duration::from_secs(600)
        );
        assert_eq!(
            Duration::from(ResponseTimeout::Data),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_submission_classification() {
        assert_eq!(classify_submission(200, b"\"id\""), SubmitDisposition::Accepted);
        assert_eq!(classify_submission(202, b""), SubmitDisposition::Accepted);
        assert_eq!(classify_submission(401, b""), SubmitDisposition::Unauthorized);
        assert_eq!(classify_submission(429, b""), SubmitDisposition::Transient);
        assert_eq!(
            classify_submission(400, NGINX_BAD_REQUEST_PAGE.as_bytes()),
            SubmitDisposition::Transient
        );
        assert_eq!(
            classify_submission(400, b"{\"error\":\"bad field\"}"),
            SubmitDisposition::Failed
        );
        assert_eq!(classify_submission(500, b"boom"), SubmitDisposition::Failed);
        assert_eq!(classify_submission(204, b""), SubmitDisposition::Failed);
    }

    #[test]
    fn test_proxy_page_other_nginx_version() {
        let page = NGINX_BAD_REQUEST_PAGE.replace("1.17.6", "1.25.3").replace("\r\n", "\n");
        assert!(is_proxy_bad_request(page.as_bytes()));
        assert!(!is_proxy_bad_request(b"<html>400</html>"));
    }

    #[tokio::test]
    async fn test_accessors() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        assert_eq!(client.access(), "alice@itsyouonline");
        assert_eq!(client.server_url(), format!("{}/restmachine", server.uri()));
        assert_eq!(client.limiter().capacity(), 5);
    }

    #[tokio::test]
    async fn test_location_is_first_host_label() {
        let server = MockServer::start().await;
        let mut config = Config::new("https://be-g8-3.demo.greenitglobe.com/")
            .with_jwt(mint_token("alice", 3600, false));
        config.jwt_public_key = TEST_PUBLIC_KEY.to_string();
        config.identity_url = server.uri();

        let client = Client::new(config).await.unwrap();
        assert_eq!(
            client.server_url(),
            "https://be-g8-3.demo.greenitglobe.com/restmachine"
        );
        assert_eq!(client.location().unwrap(), "be-g8-3");
    }

    #[tokio::test]
    async fn test_new_fetches_jwt_with_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mint_token("bob", 3600, true)))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config::new(server.uri()).with_client_credentials("id", "secret");
        config.jwt_public_key = TEST_PUBLIC_KEY.to_string();
        config.identity_url = server.uri();

        let client = Client::new(config).await.unwrap();
        assert_eq!(client.access(), "bob@itsyouonline");
        assert!(client.token().original().is_refreshable());
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = Config::new("https://g8.example.com");
        assert!(matches!(
            Client::new(config).await,
            Err(OvcError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_post_submits_async_body_with_bearer() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        let token = client.token().original().raw().to_string();

        Mock::given(method("POST"))
            .and(path("/restmachine/cloudapi/machines/get"))
            .and(header("authorization", format!("bearer {}", token).as_str()))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"machineId": 7, "_async": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"task-1\""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/restmachine/system/task/get"))
            .and(body_json(json!({"taskguid": "task-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([true, {"id": 7}])))
            .mount(&server)
            .await;

        let result: Value = client
            .post_json(
                "/cloudapi/machines/get",
                &json!({"machineId": 7}),
                ResponseTimeout::Model,
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_post_raw_without_body() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("POST"))
            .and(path("/restmachine/cloudapi/locations/list"))
            .and(body_json(json!({"_async": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"task-2\""))
            .expect(1)
            .mount(&server)
            .await;
        mount_task_result(&server, json!([true, [{"locationCode": "be-g8-3"}]])).await;

        let result = client
            .post_raw("/cloudapi/locations/list", None, ResponseTimeout::Model)
            .await
            .unwrap();
        let decoded: Value = serde_json::from_slice(&result).unwrap();
        assert_eq!(decoded, json!([{"locationCode": "be-g8-3"}]));
    }

    #[tokio::test]
    async fn test_submission_unauthorized() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client
            .post("/cloudapi/machines/list", &json!({}), ResponseTimeout::Model)
            .await
            .unwrap_err();
        assert!(matches!(err, OvcError::Authentication));
    }

    #[tokio::test]
    async fn test_submission_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("name already in use"))
            .mount(&server)
            .await;

        let err = client
            .post("/cloudapi/machines/create", &json!({}), ResponseTimeout::Model)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OvcError::RequestFailed { status: 409, ref body } if body == "name already in use"
        ));
    }

    #[tokio::test]
    async fn test_submission_deadline_covers_retries() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        Mock::given(method("POST"))
            .and(path("/restmachine/cloudapi/disks/list"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client
            .post(
                "/cloudapi/disks/list",
                &json!({"accountId": 1}),
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OvcError::Timeout(_)));
        assert!(err.is_retryable());
    }
}
