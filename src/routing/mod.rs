//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → router.rs (hostname lookup)
//!     → Return: Upstream or miss (miss = redirect to landing page)
//!
//! Table Compilation (at startup):
//!     RouteConfig[]
//!     → Parse upstream authorities
//!     → Reject duplicate hostnames
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Each hostname maps to exactly one upstream (no load balancing)
//! - Deterministic: same Host always resolves to the same upstream

pub mod router;

pub use router::{RoutingError, RoutingTable, Upstream};
