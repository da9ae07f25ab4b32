//! SQLite-backed card storage.
//!
//! This crate is the record store behind the cards service. It owns all
//! mutable card state; everything above it is stateless.
//!
//! # Core Concepts
//!
//! ## Card
//!
//! A [`Card`] is an immutable value with a store-assigned id, a display name
//! and the principal that owns it. Renaming builds a new value with
//! [`Card::renamed`] that replaces the stored row in full.
//!
//! ## CardStore
//!
//! [`CardStore`] is the storage boundary. Besides plain keyed access it
//! exposes owner-scoped primitives (`get_by_id_and_owner`, `replace_owned`,
//! `delete_owned`) that check id and owner in one statement, so callers never
//! need a separate existence check before acting.
//!
//! ## PageRequest
//!
//! A [`PageRequest`] is the canonical, already validated form of paging and
//! sorting parameters: a zero-based page number, a positive page size and an
//! ordered list of [`Sort`] terms over the [`SortField`] columns.
//!
//! # Example
//!
//! ```no_run
//! use storage::{Card, CardStore, PageRequest, Sort, SortField, SqliteCardStore};
//!
//! let store = SqliteCardStore::open("cards.db")?;
//!
//! let id = store.create(&Card::unsaved("Cash Card 1", "sarah1"))?;
//!
//! // Scoped lookups hide cards owned by someone else.
//! assert!(store.get_by_id_and_owner(id, "sarah1")?.is_some());
//! assert!(store.get_by_id_and_owner(id, "kumar2")?.is_none());
//!
//! let page = PageRequest::new(0, 10).sorted_by(Sort::desc(SortField::Name));
//! for card in store.list_by_owner_paged("sarah1", &page)? {
//!     println!("{:?}: {}", card.id, card.name);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod card;
mod error;
mod page;
mod sqlite;
mod store;

pub use card::{Card, CardDraft};
pub use error::{Error, Result};
pub use page::{Direction, PageRequest, Sort, SortField};
pub use sqlite::SqliteCardStore;
pub use store::CardStore;
