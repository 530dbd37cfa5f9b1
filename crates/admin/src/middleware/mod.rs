//! HTTP middleware stack for the admin server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authorization is not a layer: handlers call the gatekeeper explicitly.

pub mod auth;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{current_user, github_token, sign_in, sign_out};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SessionLayerError, create_session_layer};
