//! Bento Core - Shared types library.
//!
//! This crate provides the domain types used across all Bento components:
//! - `client` - Session, cart, order board and notification services
//! - `cli` - Command-line front end for customers and store staff
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no persisted state. This keeps it lightweight and lets the order
//! status machine be checked anywhere, including before a request is sent.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, order status machine, carts, orders, users

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
