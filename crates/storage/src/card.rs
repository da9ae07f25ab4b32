//! Card record types.

use serde::{Deserialize, Serialize};

/// A card owned by exactly one principal.
///
/// Cards are values: a rename produces a new `Card` carrying the same id and
/// owner, which then replaces the stored row in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Store-assigned id; `None` until the card is persisted.
    pub id: Option<i64>,
    pub name: String,
    pub owner: String,
}

impl Card {
    /// A card that has not been persisted yet.
    pub fn unsaved(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// A copy of this card with a new name; id and owner are kept.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            id: self.id,
            name: name.into(),
            owner: self.owner.clone(),
        }
    }
}

/// Client-supplied card payload.
///
/// Only the name is accepted from clients. Any `id` or `owner` present in an
/// incoming JSON body is dropped during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub name: String,
}

impl CardDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
