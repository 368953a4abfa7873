//! Parameterized queries against a single user's `permanent_files` table.
//!
//! `sort_by`/`order` are validated against a fixed allowlist rather than
//! interpolated, since column/direction names can't be bound parameters in
//! SQL — an unrecognized value is silently coerced to the default rather
//! than rejected, per spec.md §4.6.

use crate::model::FileRecord;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    CreatedAt,
    Filename,
}

impl SortBy {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("filename") => SortBy::Filename,
            _ => SortBy::CreatedAt,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::Filename => "filename",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => Order::Asc,
            _ => Order::Desc,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

pub async fn insert(pool: &SqlitePool, record: &FileRecord) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO permanent_files (id, kind, source_url, filename, object_key, public_url, metadata_json, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.kind)
    .bind(&record.source_url)
    .bind(&record.filename)
    .bind(&record.object_key)
    .bind(&record.public_url)
    .bind(&record.metadata_json)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, file_id: &str) -> sqlx::Result<Option<FileRecord>> {
    sqlx::query_as::<_, FileRecord>("SELECT * FROM permanent_files WHERE id = ?")
        .bind(file_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &SqlitePool,
    kind: Option<&str>,
    limit: u32,
    offset: u32,
    sort_by: SortBy,
    order: Order,
) -> sqlx::Result<Vec<FileRecord>> {
    let sql = format!(
        "SELECT * FROM permanent_files WHERE (?1 IS NULL OR kind = ?1) ORDER BY {} {} LIMIT ?2 OFFSET ?3",
        sort_by.column(),
        order.keyword()
    );
    sqlx::query_as::<_, FileRecord>(&sql)
        .bind(kind)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

pub async fn count(pool: &SqlitePool, kind: Option<&str>) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM permanent_files WHERE (?1 IS NULL OR kind = ?1)")
        .bind(kind)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn delete(pool: &SqlitePool, file_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM permanent_files WHERE id = ?")
        .bind(file_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_sort_by_coerces_to_created_at() {
        assert_eq!(SortBy::parse(Some("'; DROP TABLE permanent_files; --")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(None), SortBy::CreatedAt);
    }

    #[test]
    fn unrecognized_order_coerces_to_desc() {
        assert_eq!(Order::parse(Some("nonsense")), Order::Desc);
        assert_eq!(Order::parse(Some("asc")), Order::Asc);
    }
}
