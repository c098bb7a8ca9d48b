//! Core types for Bento.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod filter;
pub mod id;
pub mod order;
pub mod price;
pub mod status;
pub mod user;

pub use cart::{Cart, CartItem, CartKind, MenuRef, StoreMismatch};
pub use filter::{FilterParseError, OrderFilters, OrderSort};
pub use id::*;
pub use order::{Order, OrderCounts};
pub use price::Yen;
pub use status::*;
pub use user::{Role, RoleName, User, UserRoleAssignment};
