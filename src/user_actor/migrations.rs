//! Idempotent per-user schema migration (spec.md §4.6, columns per §3).

use sqlx::SqlitePool;

pub async fn run(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permanent_files (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            source_url TEXT NOT NULL,
            filename TEXT NOT NULL,
            object_key TEXT NOT NULL,
            public_url TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_permanent_files_kind ON permanent_files(kind)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_permanent_files_created_at ON permanent_files(created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_permanent_files_expires_at ON permanent_files(expires_at)")
        .execute(pool)
        .await?;

    Ok(())
}
