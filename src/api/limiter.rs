// src/api/limiter.rs

//! Token-bucket rate limiting for outbound API requests.

use tokio::time::{Duration, Instant};

use crate::error::{AppError, Result};

/// Token-bucket rate limiter.
///
/// Allows bursts up to `burst` requests while bounding the long-run rate to
/// `rate` requests per second. One limiter serves one client; callers must
/// serialize `acquire` calls per instance (the client holds the limiter
/// behind a mutex).
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: u32,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a rate limiter allowing `rate` requests per second with bursts
    /// of up to `burst`.
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if rate <= 0.0 {
            return Err(AppError::invalid_argument(format!(
                "rate must be greater than 0, got {rate}"
            )));
        }
        if burst < 1 {
            return Err(AppError::invalid_argument(format!(
                "burst must be at least 1, got {burst}"
            )));
        }

        Ok(Self {
            rate,
            burst,
            tokens: burst as f64,
            last_refill: Instant::now(),
        })
    }

    /// Acquire one token, suspending just long enough to keep the long-run
    /// rate below the limit.
    pub async fn acquire(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        // Refill from elapsed time, clamped to the burst capacity.
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst as f64);
        self.last_refill = now;

        if self.tokens < 1.0 {
            let wait = (1.0 - self.tokens) / self.rate;
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            self.tokens = 1.0;
            self.last_refill = Instant::now();
        }

        self.tokens -= 1.0;
    }

    /// Configured requests-per-second rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Configured burst capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }
}
