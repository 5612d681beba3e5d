#![allow(dead_code)]

use ovc_sdk::testing::{TEST_PUBLIC_KEY, mint_token};
use ovc_sdk::{Client, Config, Timing};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TASK_PATH: &str = "/restmachine/system/task/get";

/// Config for a G8 and itsyou.online both served by `server`
pub fn config(server: &MockServer) -> Config {
    let mut config = Config::new(server.uri()).with_jwt(mint_token("alice", 3600, false));
    config.jwt_public_key = TEST_PUBLIC_KEY.to_string();
    config.identity_url = server.uri();
    config.timing = Timing::scaled(Duration::from_millis(5));
    config
}

pub async fn client(server: &MockServer) -> Client {
    Client::new(config(server)).await.unwrap()
}

/// Task id the submission mock of `endpoint` answers with
pub fn task_id(endpoint: &str) -> String {
    format!("task{}", endpoint.replace('/', "-"))
}

/// Accept a submission to `endpoint` once with a quoted task id
pub async fn mount_submission(server: &MockServer, endpoint: &str, request: Value) {
    let mut request = request;
    request["_async"] = json!(true);
    Mock::given(method("POST"))
        .and(path(format!("/restmachine{}", endpoint)))
        .and(body_partial_json(request))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("\"{}\"", task_id(endpoint))),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Answer polls for the task of `endpoint` with `body`
pub async fn mount_task(server: &MockServer, endpoint: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(TASK_PATH))
        .and(body_json(json!({ "taskguid": task_id(endpoint) })))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// A call to `endpoint` whose body contains `request` and whose task succeeds with `result`
pub async fn mount_call(server: &MockServer, endpoint: &str, request: Value, result: Value) {
    mount_submission(server, endpoint, request).await;
    mount_task(server, endpoint, 200, json!([true, result])).await;
}
