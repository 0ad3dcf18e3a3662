//! Tidecart Core - Shared types library.
//!
//! This crate provides the lite domain types shared across the Tidecart
//! components:
//! - `offline` - Page-runtime offline layers (store, interceptor, monitor)
//! - `gateway` - Network-boundary cache tier
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no cache
//! storage. "Lite" is deliberate: these are the last-known-good shapes the
//! offline subsystem snapshots, not the full catalog records the origin
//! serves.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, and the product/user summary records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
