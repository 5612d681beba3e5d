//! Asynchronous task results
//!
//! An accepted `_async` call answers with a task id. The client then posts
//! that id to `/system/task/get` until the G8 reports the task outcome as a
//! two element array `[success, value]`.

use crate::client::{Client, RawResponse};
use crate::error::{OvcError, Result};
use crate::retry::Deadline;
use serde::Serialize;
use serde_json::Value;

/// Endpoint the task status is polled on, relative to the server URL
pub const TASK_STATUS_ENDPOINT: &str = "/system/task/get";

/// Identifier of a task accepted by the G8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Task id from a submission response body, quotes removed
    pub fn from_response(body: &[u8]) -> Self {
        Self(String::from_utf8_lossy(body).trim().replace('"', ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct TaskQuery<'a> {
    taskguid: &'a str,
}

/// Outcome reported by the G8 for a finished task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Success(Value),
    Failure(Value),
}

/// State of a task as read from one status response body
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Done(TaskResult),
}

impl TaskStatus {
    /// Interpret a status body
    ///
    /// Empty bodies, empty arrays and bodies that are not a JSON array mean
    /// the task is still running. A non-empty array must be `[bool, value]`;
    /// anything else is a protocol violation, returned as `Err(detail)`.
    pub fn from_body(body: &[u8]) -> std::result::Result<Self, String> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(TaskStatus::Pending);
        }

        let items = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Array(items)) => items,
            Ok(_) | Err(_) => return Ok(TaskStatus::Pending),
        };
        if items.is_empty() {
            return Ok(TaskStatus::Pending);
        }

        let received = Value::Array(items.clone()).to_string();
        let [flag, value]: [Value; 2] = items
            .try_into()
            .map_err(|_| format!("received: {}", received))?;
        match flag {
            Value::Bool(true) => Ok(TaskStatus::Done(TaskResult::Success(value))),
            Value::Bool(false) => Ok(TaskStatus::Done(TaskResult::Failure(value))),
            _ => Err(format!("received: {}", received)),
        }
    }
}

/// How a single status poll is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollDisposition {
    Unauthorized,
    NotFound,
    Transient,
    Failed,
    Inspect,
}

fn classify_poll(status: u16) -> PollDisposition {
    match status {
        401 => PollDisposition::Unauthorized,
        404 => PollDisposition::NotFound,
        400 | 429 => PollDisposition::Transient,
        s if s > 429 => PollDisposition::Failed,
        _ => PollDisposition::Inspect,
    }
}

impl Client {
    /// Poll `task` until it finishes, fails or `deadline` passes
    ///
    /// Returns the JSON encoding of the task's success value.
    pub async fn wait_for_task(&self, task: &TaskHandle, deadline: &Deadline) -> Result<Vec<u8>> {
        let url = self.endpoint_url(TASK_STATUS_ENDPOINT);
        let query = serde_json::to_vec(&TaskQuery {
            taskguid: task.as_str(),
        })?;
        let timing = self.timing();
        let mut transport_retry = timing.poll_transport_retry.start();
        let mut not_found_seen = false;

        loop {
            if deadline.expired() {
                tracing::error!("Task failed to complete within the timeout: {}", task);
                return Err(OvcError::Timeout(task.to_string()));
            }

            let RawResponse { status, body } =
                match self.send(reqwest::Method::POST, &url, &query, deadline).await {
                    Ok(response) => response,
                    Err(OvcError::Http(e)) => {
                        tracing::error!("Error getting task result for {}: {}", task, e);
                        match transport_retry.next_delay() {
                            Some(delay) => {
                                deadline.sleep(delay).await;
                                continue;
                            }
                            None => return Err(OvcError::Http(e)),
                        }
                    }
                    Err(OvcError::Timeout(_)) => return Err(OvcError::Timeout(task.to_string())),
                    Err(e) => return Err(e),
                };

            tracing::debug!(
                "OVC task call: {} status: {} response: {}",
                task,
                status,
                String::from_utf8_lossy(&body)
            );

            match classify_poll(status.as_u16()) {
                PollDisposition::Unauthorized => {
                    tracing::error!("Unauthorized while polling task {}", task);
                    return Err(OvcError::Authentication);
                }
                PollDisposition::NotFound if !not_found_seen => {
                    not_found_seen = true;
                    tracing::warn!("Task {} not registered yet, polling again", task);
                    deadline.sleep(timing.poll_interval).await;
                    continue;
                }
                PollDisposition::NotFound => {
                    tracing::error!("Task not found: {}", task);
                    return Err(OvcError::TaskNotFound(task.to_string()));
                }
                PollDisposition::Transient => {
                    tracing::warn!("Received {} while polling task {}, retrying", status, task);
                    deadline.sleep(timing.poll_interval).await;
                    continue;
                }
                PollDisposition::Failed => {
                    tracing::error!("Task {} failed with status {}", task, status);
                    return Err(OvcError::RequestFailed {
                        status: status.as_u16(),
                        body: task.to_string(),
                    });
                }
                PollDisposition::Inspect => {}
            }

            match TaskStatus::from_body(&body) {
                Ok(TaskStatus::Pending) => deadline.sleep(timing.poll_interval).await,
                Ok(TaskStatus::Done(TaskResult::Success(value))) => {
                    tracing::debug!("Task {} succeeded", task);
                    return Ok(serde_json::to_vec(&value)?);
                }
                Ok(TaskStatus::Done(TaskResult::Failure(diagnostic))) => {
                    tracing::error!("Task was not successful taskID: {}: {}", task, diagnostic);
                    return Err(OvcError::TaskFailed {
                        task: task.to_string(),
                        diagnostic,
                    });
                }
                Err(detail) => {
                    tracing::error!("Malformed result for task {}: {}", task, detail);
                    return Err(OvcError::ProtocolViolation {
                        task: task.to_string(),
                        detail,
                    });
                }
            }
        }
    }
}
