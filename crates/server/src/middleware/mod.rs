//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (new hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span, echoed back)
//! 4. CORS (only when an origin is configured)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Security headers
//! 7. Rate limiting (governor), per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAdmin, RequireAuth, clear_current_user, set_current_user};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
