// Migration Runner

use carddock_core::error::{AppError, Result};
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
)";

/// (version, description, statements)
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "Initial contacts schema",
        "
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            display_name TEXT NOT NULL,
            properties TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_contacts_created ON contacts(created_at);
        ",
    ),
    (
        2,
        "Account columns",
        "
        -- imported entries may be attached to an account
        ALTER TABLE contacts ADD COLUMN account_name TEXT;
        ALTER TABLE contacts ADD COLUMN account_type TEXT;
        CREATE INDEX IF NOT EXISTS idx_contacts_account ON contacts(account_name, account_type);
        ",
    ),
];

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::query(SCHEMA_VERSION_TABLE)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

    info!("Current schema version: {}", current_version);

    for (version, description, sql) in MIGRATIONS {
        if current_version < *version {
            info!("Applying migration {:03}: {}", version, description);
            apply_migration(pool, *version, sql).await?;
        }
    }

    info!("All migrations applied successfully");
    Ok(())
}

/// Apply one migration and record it, in a single transaction
async fn apply_migration(pool: &SqlitePool, version: i64, sql: &str) -> Result<()> {
    let db = |e: sqlx::Error| AppError::Database(format!("migration {}: {}", version, e));
    let mut tx = pool.begin().await.map_err(db)?;

    for statement in sql.split(';') {
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }
    }

    sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
        .bind(version)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(db)?;

    tx.commit().await.map_err(db)?;
    Ok(())
}
