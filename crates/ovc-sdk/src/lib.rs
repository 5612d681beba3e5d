//! OpenvCloud API client
//!
//! Client for the G8 `restmachine` API with itsyou.online authentication.
//! Every call runs as an asynchronous G8 task: the request is submitted with
//! `"_async": true` and the resulting task is polled until it reports its
//! outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  services: machines, disks, cloudspaces, ...     │
//! └─────────────────┬────────────────────────────────┘
//!                   │ post / post_raw / post_json
//! ┌─────────────────▼────────────────────────────────┐
//! │                    Client                         │
//! │  ┌──────────────┐ ┌─────────────┐ ┌────────────┐ │
//! │  │ TokenManager │ │   Request   │ │  Resource  │ │
//! │  │ (JWT refresh)│ │   Limiter   │ │   Locks    │ │
//! │  └──────────────┘ └─────────────┘ └────────────┘ │
//! │  submit (retry 429 / proxy 400) → poll task      │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//!          G8 /restmachine + itsyou.online
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ovc_sdk::{Client, Config};
//!
//! # async fn run() -> ovc_sdk::Result<()> {
//! let config = Config::new("https://be-g8-3.demo.greenitglobe.com")
//!     .with_client_credentials("client-id", "client-secret");
//! let client = Client::new(config).await?;
//!
//! for machine in client.machines().list(42).await? {
//!     println!("{} {}", machine.id, machine.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod limiter;
pub mod lock;
pub mod request;
pub mod retry;
pub mod services;
pub mod task;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use client::{Client, NGINX_BAD_REQUEST_PAGE, ResponseTimeout};
pub use config::{Config, Timing};
pub use error::{OvcError, Result};
pub use identity::ItsYouOnline;
pub use jwt::{Token, TokenManager};
pub use limiter::{RequestLimiter, RequestPermit};
pub use lock::{ResourceGuard, ResourceLocks};
pub use request::{AsyncBody, mark_async};
pub use retry::{Backoff, Deadline, RetryConfig};
pub use task::{TaskHandle, TaskResult, TaskStatus};
