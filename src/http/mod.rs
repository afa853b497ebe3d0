//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → dispatcher.rs (host lookup, API policy, rate limit, forward)
//!     → context.rs (timing, metrics and access log on completion)
//!     → response.rs (error bodies, rate limit headers, asset caching)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatcher;
pub mod response;
pub mod server;

use axum::http::HeaderName;

pub use dispatcher::Dispatcher;
pub use server::HttpServer;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
