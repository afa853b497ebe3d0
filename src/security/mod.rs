//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on the API host:
//!     → api_policy.rs (CORS, deprecated/invalid API versions)
//!     → rate_limit.rs (select key and policy, GCRA check)
//!         → store.rs / redis_store.rs (atomic TAT update)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Forward upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unreachable rate limit store rejects the request
//! - No trust in client input: X-Forwarded-* are overwritten
//! - The limiter is stateless; the store serialises concurrent callers

pub mod api_policy;
pub mod headers;
pub mod rate_limit;
pub mod redis_store;
pub mod store;

pub use rate_limit::{PolicySelector, RateLimitDecision, RateLimitKey, RateLimitPolicy, RateLimiter};
pub use redis_store::RedisStore;
pub use store::{Clock, ManualClock, MemoryStore, RateLimitStore, StoreError, SystemClock};
