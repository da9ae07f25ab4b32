//! Cards service — owner-scoped access to card records.
//!
//! This crate combines the record store, the ownership policy and paging
//! negotiation into the operations exposed to clients.
//!
//! # Overview
//!
//! - **CardService**: read-one, list, list-page, create, update and delete on
//!   behalf of an authenticated [`Principal`](policy::Principal).
//! - **paging**: turns raw `page`/`size`/`sort` values into a validated
//!   [`PageRequest`](storage::PageRequest).
//!
//! A card that does not exist and a card owned by someone else produce the
//! same [`Error::NotFound`]. Store failures are reported separately and are
//! never folded into not-found.
//!
//! # Example
//!
//! ```ignore
//! use policy::{Policy, Principal};
//! use service::CardService;
//! use storage::{CardDraft, SqliteCardStore};
//!
//! # async fn example() -> service::Result<()> {
//! let store = SqliteCardStore::in_memory()?;
//! let service = CardService::new(store, Policy::masked());
//!
//! let sarah = Principal::new("sarah1").expect("non-empty");
//! let id = service.create(&sarah, CardDraft::new("Cash Card 1")).await?;
//! let card = service.get(id, &sarah).await?;
//! assert_eq!(card.owner, "sarah1");
//! # Ok(())
//! # }
//! ```

mod error;
pub mod paging;
mod service;

pub use error::{Error, Result};
pub use paging::{PageParams, PagingLimits, ValidationError};
pub use service::{CardService, DEFAULT_STORE_TIMEOUT};
