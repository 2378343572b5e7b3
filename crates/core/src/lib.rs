//! eTuckshop Core - Shared domain types and rules.
//!
//! This crate provides the types and business rules used across all eTuckshop
//! components:
//! - `server` - REST API for the storefront and the admin back-office
//! - `cli` - Command-line tools for migrations, admin users and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Anything that decides *whether* something is allowed
//! (an order transition, a cart line, a QR still being valid) lives here so it
//! can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails and status enums
//! - [`order`] - Order status state machine and order numbers
//! - [`qr`] - Payment QR validity windows
//! - [`stock`] - Derived stock levels
//! - [`cart`] - Cart line validation and totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod qr;
pub mod stock;
pub mod types;

pub use cart::{CartError, CartLine, CartTotals, StockWarning};
pub use order::{OrderNumber, OrderTransition, TransitionError};
pub use qr::{QrState, QrWindow};
pub use stock::StockLevel;
pub use types::*;
