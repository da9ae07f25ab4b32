//! SQLite card store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::{Card, CardStore, Error, PageRequest, Result};

const COLUMNS: &str = "id, name, owner";

/// SQLite-backed card store.
///
/// A single connection is shared behind a mutex, so every statement runs
/// serialized. The owner-scoped mutations are one statement each.
pub struct SqliteCardStore {
    conn: Mutex<Connection>,
}

impl SqliteCardStore {
    /// Open or create a card store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory card store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    /// How long a statement waits on a locked database before failing.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        self.lock()?.busy_timeout(timeout)?;
        Ok(self)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cards_owner
                ON cards(owner, id);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }
}

impl CardStore for SqliteCardStore {
    fn create(&self, card: &Card) -> Result<i64> {
        require_owner(card)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cards (name, owner) VALUES (?1, ?2)",
            params![card.name, card.owner],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, owner = %card.owner, "card inserted");
        Ok(id)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Card>> {
        let conn = self.lock()?;
        let card = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM cards WHERE id = ?1"),
                [id],
                card_from_row,
            )
            .optional()?;
        Ok(card)
    }

    fn get_by_id_and_owner(&self, id: i64, owner: &str) -> Result<Option<Card>> {
        let conn = self.lock()?;
        let card = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM cards WHERE id = ?1 AND owner = ?2"),
                params![id, owner],
                card_from_row,
            )
            .optional()?;
        Ok(card)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<Card>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM cards WHERE owner = ?1 ORDER BY id"))?;
        let cards = stmt
            .query_map([owner], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    fn list_by_owner_paged(&self, owner: &str, page: &PageRequest) -> Result<Vec<Card>> {
        // The ORDER BY body is built from the closed set of sort columns only.
        let sql = format!(
            "SELECT {COLUMNS} FROM cards WHERE owner = ?1 ORDER BY {} LIMIT ?2 OFFSET ?3",
            page.order_by()
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let cards = stmt
            .query_map(
                params![owner, i64::from(page.size), page.offset()],
                card_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(
            owner,
            page = page.page,
            size = page.size,
            returned = cards.len(),
            "page listed"
        );
        Ok(cards)
    }

    fn exists_by_id_and_owner(&self, id: i64, owner: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE id = ?1 AND owner = ?2)",
            params![id, owner],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn count_by_owner(&self, owner: &str) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE owner = ?1",
            [owner],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM cards WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    fn save(&self, card: &Card) -> Result<()> {
        let id = card.id.ok_or(Error::MissingId)?;
        require_owner(card)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cards (id, name, owner) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, owner = excluded.owner",
            params![id, card.name, card.owner],
        )?;
        Ok(())
    }

    fn replace_owned(&self, card: &Card) -> Result<bool> {
        let id = card.id.ok_or(Error::MissingId)?;
        require_owner(card)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE cards SET name = ?1 WHERE id = ?2 AND owner = ?3",
            params![card.name, id, card.owner],
        )?;
        Ok(changed > 0)
    }

    fn delete_owned(&self, id: i64, owner: &str) -> Result<Option<Card>> {
        let conn = self.lock()?;
        let removed = conn
            .query_row(
                &format!("DELETE FROM cards WHERE id = ?1 AND owner = ?2 RETURNING {COLUMNS}"),
                params![id, owner],
                card_from_row,
            )
            .optional()?;
        Ok(removed)
    }
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        owner: row.get(2)?,
    })
}

fn require_owner(card: &Card) -> Result<()> {
    if card.owner.trim().is_empty() {
        return Err(Error::MissingOwner);
    }
    Ok(())
}
