//! Rate-limited, retrying access to the ESPN API.

pub mod client;
pub mod limiter;
pub mod retry;

pub use client::{ApiClient, ScoreboardFetch};
pub use limiter::RateLimiter;
pub use retry::RetryPolicy;
