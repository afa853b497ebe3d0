//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every finished request:
//!     → canonical.rs (raw path → bounded route label)
//!     → metrics.rs (latency histogram, rate limit and upstream counters)
//!     → access_log.rs (one structured event per request)
//!     → logging.rs (subscriber: JSON or pretty, env filter)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, separate port)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Route labels come only from the canonicalizer, keeping cardinality bounded
//! - Metrics are cheap (atomic increments)

pub mod access_log;
pub mod canonical;
pub mod logging;
pub mod metrics;

pub use access_log::AccessLogEntry;
pub use canonical::PathCanonicalizer;
