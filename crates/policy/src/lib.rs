//! Ownership policy for card access.
//!
//! Core principle: **a caller can only tell that a record exists if they own it.**

mod error;
mod policy;
mod principal;

pub use error::{Error, Result};
pub use policy::{Access, Decision, OwnershipRules, Policy, UnownedPrincipal};
pub use principal::Principal;
