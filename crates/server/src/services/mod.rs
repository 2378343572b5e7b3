//! Business logic services.
//!
//! Services sit between route handlers and the database layer. Each one
//! borrows the pool (and whatever shared state it needs) for the duration of
//! a request.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod qr_token;
pub mod sweep;

pub use auth::{AuthError, AuthService};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use payments::PaymentService;
