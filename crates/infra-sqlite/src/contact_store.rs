// SQLite ContactStore Implementation

use carddock_core::domain::{AccountRef, ContactEntry, EntryId, Property};
use carddock_core::error::{AppError, Result};
use carddock_core::port::{ContactStore, StoreError};
use sqlx::SqlitePool;
use std::future::Future;
use tokio::runtime::Handle;
use tracing::debug;

// Helper to convert sqlx::Error to StoreError with structured information
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" | "787" | "3850" | "1299" => StoreError::Rejected(format!(
                        "Constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => StoreError::Backend(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => StoreError::Backend(format!("Database full: {}", db_err.message())),
                    _ => StoreError::Backend(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                StoreError::Backend(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => StoreError::Backend("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            StoreError::Backend(format!("Column not found: {}", col))
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Contact store on SQLite
///
/// The port is synchronous because job bodies run on the blocking pool; each
/// call drives the sqlx future on the runtime `handle`. Do not call these
/// methods from async code.
pub struct SqliteContactStore {
    pool: SqlitePool,
    handle: Handle,
}

impl SqliteContactStore {
    pub fn new(pool: SqlitePool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    /// Bind to the runtime the caller is running in
    pub fn from_current(pool: SqlitePool) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| AppError::Internal(format!("No tokio runtime: {}", e)))?;
        Ok(Self::new(pool, handle))
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Load one entry
    pub fn get(&self, id: EntryId) -> std::result::Result<Option<ContactEntry>, StoreError> {
        let row = self
            .block_on(
                sqlx::query_as::<_, ContactRow>(
                    "SELECT id, display_name, properties FROM contacts WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool),
            )
            .map_err(map_sqlx_error)?;

        row.map(ContactRow::into_entry).transpose().map(|found| found.map(|(_, entry)| entry))
    }

    /// Account an entry was imported into
    pub fn account_of(&self, id: EntryId) -> std::result::Result<Option<AccountRef>, StoreError> {
        let row: Option<(Option<String>, Option<String>)> = self
            .block_on(
                sqlx::query_as("SELECT account_name, account_type FROM contacts WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .map_err(map_sqlx_error)?;

        Ok(match row {
            Some((Some(name), Some(account_type))) => Some(AccountRef { name, account_type }),
            _ => None,
        })
    }
}

impl ContactStore for SqliteContactStore {
    fn commit(
        &self,
        entry: &ContactEntry,
        account: Option<&AccountRef>,
    ) -> std::result::Result<EntryId, StoreError> {
        let properties = serde_json::to_string(&entry.properties)
            .map_err(|e| StoreError::Rejected(format!("Unserializable properties: {}", e)))?;

        let result = self
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO contacts (display_name, properties, account_name, account_type, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&entry.display_name)
                .bind(properties)
                .bind(account.map(|a| a.name.as_str()))
                .bind(account.map(|a| a.account_type.as_str()))
                .bind(chrono::Utc::now().timestamp_millis())
                .execute(&self.pool),
            )
            .map_err(map_sqlx_error)?;

        let id = result.last_insert_rowid();
        debug!(entry_id = id, display_name = %entry.display_name, "Contact committed");
        Ok(id)
    }

    fn count(&self) -> std::result::Result<usize, StoreError> {
        let count: i64 = self
            .block_on(sqlx::query_scalar("SELECT COUNT(*) FROM contacts").fetch_one(&self.pool))
            .map_err(map_sqlx_error)?;
        Ok(count.max(0) as usize)
    }

    fn page(
        &self,
        after: Option<EntryId>,
        limit: usize,
    ) -> std::result::Result<Vec<(EntryId, ContactEntry)>, StoreError> {
        let rows = self
            .block_on(
                sqlx::query_as::<_, ContactRow>(
                    r#"
                    SELECT id, display_name, properties FROM contacts
                    WHERE id > ?
                    ORDER BY id ASC
                    LIMIT ?
                    "#,
                )
                .bind(after.unwrap_or(0))
                .bind(limit as i64)
                .fetch_all(&self.pool),
            )
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(ContactRow::into_entry).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: i64,
    display_name: String,
    properties: String,
}

impl ContactRow {
    fn into_entry(self) -> std::result::Result<(EntryId, ContactEntry), StoreError> {
        let properties: Vec<Property> = serde_json::from_str(&self.properties).map_err(|e| {
            StoreError::Backend(format!("Corrupt properties for contact {}: {}", self.id, e))
        })?;
        Ok((
            self.id,
            ContactEntry {
                display_name: self.display_name,
                properties,
            },
        ))
    }
}
