//! Ownership policy configuration and enforcement.

use crate::{Error, Principal, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Policy configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Rules for id-addressed access to owned records.
    #[serde(default)]
    pub ownership: OwnershipRules,
}

/// Rules for id-addressed access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipRules {
    /// How a miss is reported to a principal that owns no records at all.
    #[serde(default)]
    pub unowned_principal: UnownedPrincipal,
}

/// Treatment of principals that own nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnownedPrincipal {
    /// Same answer as any other miss. Keeps record existence hidden.
    #[default]
    NotFound,
    /// Reject outright. Tells the caller they own nothing, which leaks a bit
    /// of information about the store.
    Forbidden,
}

/// The kind of id-addressed access being decided.
///
/// Listing and creation are not represented: they are scoped by owner
/// filtering and owner stamping and need no decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Update,
    Delete,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Read => "read",
            Access::Update => "update",
            Access::Delete => "delete",
        })
    }
}

/// Result of an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The record exists and belongs to the principal.
    FoundAndOwned,
    /// Either no such record or someone else's. Deliberately not told apart.
    NotFoundOrNotOwned,
    /// The principal owns no records. Only produced under
    /// [`UnownedPrincipal::Forbidden`].
    NoOwnedRecords,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::FoundAndOwned)
    }
}

impl Policy {
    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Policy that reports every miss as not-found.
    pub fn masked() -> Self {
        Self::default()
    }

    /// Decide on an id-addressed access.
    ///
    /// `owner` is the owner of the record as returned by a lookup that was
    /// already scoped to the principal, or `None` when that lookup came back
    /// empty. Passing an unscoped owner still works: a foreign owner is
    /// reported the same way as a missing record.
    pub fn authorize(
        &self,
        principal: &Principal,
        access: Access,
        owner: Option<&str>,
    ) -> Decision {
        let decision = match owner {
            Some(owner) if owner == principal.as_str() => Decision::FoundAndOwned,
            _ => Decision::NotFoundOrNotOwned,
        };
        debug!(%principal, %access, ?decision, "ownership decided");
        decision
    }

    /// Whether a miss must be refined by how many records the principal owns.
    pub fn distinguishes_unowned(&self) -> bool {
        self.ownership.unowned_principal == UnownedPrincipal::Forbidden
    }

    /// Refine a [`Decision::NotFoundOrNotOwned`] given the principal's total
    /// number of owned records.
    pub fn refine_miss(&self, owned_total: u64) -> Decision {
        if self.distinguishes_unowned() && owned_total == 0 {
            Decision::NoOwnedRecords
        } else {
            Decision::NotFoundOrNotOwned
        }
    }
}
