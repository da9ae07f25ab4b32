//! The record store boundary.

use crate::{Card, PageRequest, Result};

/// Durable keyed storage for cards.
///
/// Every owner-scoped method filters by id and owner in a single predicate.
/// Callers that must not reveal whether a card exists (see the service crate)
/// only ever use the scoped methods; the unscoped ones exist for
/// administration and tests.
///
/// Implementations must serialize conflicting writes to the same id, so that
/// two racing mutations leave exactly one winner.
pub trait CardStore: Send + Sync {
    /// Insert a new card and return its assigned id. Any id already on the
    /// card is ignored.
    fn create(&self, card: &Card) -> Result<i64>;

    fn get_by_id(&self, id: i64) -> Result<Option<Card>>;

    fn get_by_id_and_owner(&self, id: i64, owner: &str) -> Result<Option<Card>>;

    /// All cards of `owner`, ordered by id.
    fn list_by_owner(&self, owner: &str) -> Result<Vec<Card>>;

    /// The content of one page of `owner`'s cards. Totals are not computed.
    fn list_by_owner_paged(&self, owner: &str, page: &PageRequest) -> Result<Vec<Card>>;

    fn exists_by_id_and_owner(&self, id: i64, owner: &str) -> Result<bool>;

    fn count_by_owner(&self, owner: &str) -> Result<u64>;

    /// Delete by id regardless of owner. Returns whether a row was removed.
    fn delete_by_id(&self, id: i64) -> Result<bool>;

    /// Full replace of a persisted card. The card must carry an id.
    fn save(&self, card: &Card) -> Result<()>;

    /// Replace the card only if a row with the same id and owner exists.
    ///
    /// Returns `false` when no such row exists; nothing is written then.
    fn replace_owned(&self, card: &Card) -> Result<bool>;

    /// Delete the card only if it is owned by `owner`.
    ///
    /// Returns the removed card, or `None` when nothing matched.
    fn delete_owned(&self, id: i64, owner: &str) -> Result<Option<Card>>;
}
