//! Core types for Tidecart.
//!
//! This module provides type-safe wrappers for the domain concepts the
//! offline subsystem snapshots.

pub mod id;
pub mod price;
pub mod product;
pub mod user;

pub use id::{ProductId, UserId};
pub use price::{CurrencyCode, Price};
pub use product::ProductSummary;
pub use user::{Email, EmailError, UserProfile};
