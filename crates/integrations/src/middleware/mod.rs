//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. CORS
//!
//! Authentication happens upstream; the gateway forwards the caller's id in
//! the `x-user-id` header, read by [`auth::CurrentUser`].

pub mod auth;

pub use auth::{CurrentUser, USER_ID_HEADER};
