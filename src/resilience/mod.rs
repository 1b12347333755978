mod rate_limiter;
mod retry;

pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::{RetryConfig, RetryPolicy, Sleeper, TokioSleeper};
