//! Owner-scoped card operations.

use std::sync::Arc;
use std::time::Duration;

use policy::{Access, Decision, Policy, Principal};
use storage::{Card, CardDraft, CardStore, PageRequest};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Card operations on behalf of an authenticated principal.
///
/// The service holds no mutable state of its own. Store calls run on the
/// blocking pool and are bounded by a timeout; a store failure is reported as
/// such and never turned into a not-found.
pub struct CardService<S> {
    store: Arc<S>,
    policy: Policy,
    timeout: Duration,
}

impl<S: CardStore + 'static> CardService<S> {
    pub fn new(store: S, policy: Policy) -> Self {
        Self::shared(Arc::new(store), policy)
    }

    /// Build on a store that is also used elsewhere.
    pub fn shared(store: Arc<S>, policy: Policy) -> Self {
        Self {
            store,
            policy,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch one card by id.
    pub async fn get(&self, id: i64, principal: &Principal) -> Result<Card> {
        let owner = principal.as_str().to_owned();
        let found = self
            .run("get_by_id_and_owner", move |s| s.get_by_id_and_owner(id, &owner))
            .await?;
        match self.owned(principal, Access::Read, found) {
            Some(card) => Ok(card),
            None => Err(self.miss(id, principal).await),
        }
    }

    /// Every card the principal owns, ordered by id.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Card>> {
        let owner = principal.as_str().to_owned();
        self.run("list_by_owner", move |s| s.list_by_owner(&owner)).await
    }

    /// One page of the principal's cards.
    pub async fn list_page(&self, principal: &Principal, page: PageRequest) -> Result<Vec<Card>> {
        let owner = principal.as_str().to_owned();
        self.run("list_by_owner_paged", move |s| {
            s.list_by_owner_paged(&owner, &page)
        })
        .await
    }

    /// Create a card owned by the principal and return its id.
    pub async fn create(&self, principal: &Principal, draft: CardDraft) -> Result<i64> {
        let card = Card::unsaved(draft.name, principal.as_str());
        let id = self.run("create", move |s| s.create(&card)).await?;
        info!(id, %principal, "card created");
        Ok(id)
    }

    /// Rename a card the principal owns.
    pub async fn update(&self, id: i64, principal: &Principal, draft: CardDraft) -> Result<()> {
        let owner = principal.as_str().to_owned();
        let found = self
            .run("get_by_id_and_owner", move |s| s.get_by_id_and_owner(id, &owner))
            .await?;
        let Some(current) = self.owned(principal, Access::Update, found) else {
            return Err(self.miss(id, principal).await);
        };

        let replacement = current.renamed(draft.name);
        let replaced = self
            .run("replace_owned", move |s| s.replace_owned(&replacement))
            .await?;
        if !replaced {
            // Deleted between the lookup and the write.
            debug!(id, %principal, "card vanished before update");
            return Err(self.miss(id, principal).await);
        }
        info!(id, %principal, "card updated");
        Ok(())
    }

    /// Delete a card the principal owns.
    pub async fn delete(&self, id: i64, principal: &Principal) -> Result<()> {
        let owner = principal.as_str().to_owned();
        let removed = self
            .run("delete_owned", move |s| s.delete_owned(id, &owner))
            .await?;
        if self.owned(principal, Access::Delete, removed).is_none() {
            return Err(self.miss(id, principal).await);
        }
        info!(id, %principal, "card deleted");
        Ok(())
    }

    fn owned(&self, principal: &Principal, access: Access, found: Option<Card>) -> Option<Card> {
        let owner = found.as_ref().map(|card| card.owner.as_str());
        let decision = self.policy.authorize(principal, access, owner);
        found.filter(|_| decision.is_allowed())
    }

    /// The error reported when an id-addressed access finds nothing to act on.
    async fn miss(&self, id: i64, principal: &Principal) -> Error {
        if self.policy.distinguishes_unowned() {
            let owner = principal.as_str().to_owned();
            match self.run("count_by_owner", move |s| s.count_by_owner(&owner)).await {
                Ok(total) => {
                    if self.policy.refine_miss(total) == Decision::NoOwnedRecords {
                        return Error::Forbidden {
                            principal: principal.to_string(),
                        };
                    }
                }
                Err(e) => return e,
            }
        }
        Error::NotFound { id }
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> storage::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                warn!(op, busy = e.is_busy(), error = %e, "store call failed");
                Err(Error::Store(e))
            }
            Ok(Err(e)) => {
                warn!(op, error = %e, "store call aborted");
                Err(Error::Aborted(e.to_string()))
            }
            Err(_) => {
                warn!(op, timeout = ?self.timeout, "store call timed out");
                Err(Error::Timeout(self.timeout))
            }
        }
    }
}
