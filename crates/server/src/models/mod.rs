//! Domain models for the tuckshop API.
//!
//! These are the shapes handlers return inside the response envelope. They
//! are separate from the database row types in [`crate::db`].

pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod order;
pub mod session;
pub mod user;

pub use cart::{CartItemView, CartView};
pub use catalog::{Category, CategoryDetail, CategorySummary, Product};
pub use dashboard::DashboardStats;
pub use order::{Order, OrderItem, PaymentQr, QrCodeView, QrStatusView};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
