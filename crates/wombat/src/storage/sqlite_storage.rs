//! SQLite document storage implementation
//!
//! This module provides a SQLite-based implementation of the [`Reader`] and
//! [`Printer`] capabilities. Each document kind lives in its own table
//! (`articles`, `chapters`); image metadata is stored as JSON text and
//! timestamps as Unix nanoseconds so that ordering by `created` is exact.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteQueryResult, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

use super::{Backend, Printer, Reader};
use crate::document::{Document, DocumentKind, DocumentRecord, Image};
use crate::error::{Result, WombatError};

const COLUMNS: &str =
    "title_path, title, synopsis, content, is_published, created, modified, img, imgs";

/// SQLite-based backend for one document kind
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    kind: DocumentKind,
}

impl SqliteBackend {
    /// Connect to `database_url` and prepare the table for `kind`
    pub async fn new(database_url: &str, kind: DocumentKind) -> Result<Self> {
        let pool = Self::connect(database_url).await?;
        Self::with_pool(pool, kind).await
    }

    /// Open a connection pool, creating the database file if missing.
    ///
    /// Example URL: `sqlite:./data/wombat.db`
    pub async fn connect(database_url: &str) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| WombatError::datastore("Invalid database URL", e))?
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| WombatError::datastore("Failed to connect to SQLite", e))
    }

    /// Share an existing pool, e.g. between the article and chapter backends
    pub async fn with_pool(pool: SqlitePool, kind: DocumentKind) -> Result<Self> {
        let backend = Self { pool, kind };
        backend.init_schema().await?;
        Ok(backend)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    fn table(&self) -> &'static str {
        match self.kind {
            DocumentKind::Article => "articles",
            DocumentKind::Chapter => "chapters",
        }
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        let table = self.table();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                title_path TEXT PRIMARY KEY,            -- YYYY/MM/DD/slug/
                title TEXT NOT NULL,
                synopsis TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                is_published INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL,               -- Unix nanoseconds
                modified INTEGER NOT NULL,
                img TEXT NOT NULL DEFAULT '{{}}',       -- JSON image record
                imgs TEXT NOT NULL DEFAULT '[]'         -- JSON image records
            )
        "#
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| WombatError::datastore(format!("Failed to create {table} table"), e))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_published_created \
             ON {table}(is_published, created)"
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| WombatError::datastore(format!("Failed to create {table} index"), e))?;

        Ok(())
    }

    fn bound(&self, record: DocumentRecord) -> Document {
        Document::from_record(record).bind(Arc::new(self.clone()))
    }

    fn record_from_row(row: &SqliteRow) -> Result<DocumentRecord> {
        let img: String = row.get("img");
        let imgs: String = row.get("imgs");

        Ok(DocumentRecord {
            title_path: row.get("title_path"),
            title: row.get("title"),
            synopsis: row.get("synopsis"),
            content: row.get("content"),
            is_published: row.get("is_published"),
            created: from_nanos(row.get("created"))?,
            modified: from_nanos(row.get("modified"))?,
            image: serde_json::from_str(&img)?,
            images: serde_json::from_str(&imgs)?,
        })
    }

    /// Map "no row matched" of an `UPDATE` to not found
    fn expect_one(
        &self,
        result: std::result::Result<SqliteQueryResult, sqlx::Error>,
        what: &str,
    ) -> Result<()> {
        let result = result.map_err(|e| {
            WombatError::datastore(format!("Failed to update {}'s {}", self.kind, what), e)
        })?;

        if result.rows_affected() == 0 {
            return Err(WombatError::NotFound(self.kind.label().to_string()));
        }
        Ok(())
    }
}

fn to_nanos(timestamp: OffsetDateTime) -> Result<i64> {
    i64::try_from(timestamp.unix_timestamp_nanos())
        .map_err(|_| WombatError::datastore_msg(format!("Timestamp out of range: {timestamp}")))
}

fn from_nanos(nanos: i64) -> Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))?)
}

#[async_trait]
impl Reader for SqliteBackend {
    async fn by_title_path(&self, title_path: &str, include_unpublished: bool) -> Result<Document> {
        let sql = if include_unpublished {
            format!("SELECT {COLUMNS} FROM {} WHERE title_path = ?", self.table())
        } else {
            format!(
                "SELECT {COLUMNS} FROM {} WHERE title_path = ? AND is_published = 1",
                self.table()
            )
        };

        let row = sqlx::query(&sql)
            .bind(title_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WombatError::datastore(format!("Failed to get {}", self.kind), e))?
            .ok_or_else(|| WombatError::NotFound(self.kind.label().to_string()))?;

        Ok(self.bound(Self::record_from_row(&row)?))
    }

    async fn recent(
        &self,
        limit: u32,
        page: u32,
        include_unpublished: bool,
    ) -> Result<Vec<Document>> {
        let filter = if include_unpublished { "" } else { "WHERE is_published = 1" };
        let sql = format!(
            "SELECT {COLUMNS} FROM {} {filter} \
             ORDER BY created DESC, title_path ASC LIMIT ? OFFSET ?",
            self.table()
        );
        let offset = i64::from(page) * i64::from(limit);

        tracing::debug!(
            kind = %self.kind,
            limit,
            page,
            include_unpublished,
            "querying recent documents"
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WombatError::datastore(format!("Failed to query {} list", self.kind), e))?;

        rows.iter()
            .map(|row| Ok(self.bound(Self::record_from_row(row)?)))
            .collect()
    }
}

#[async_trait]
impl Printer for SqliteBackend {
    async fn print(&self, document: &DocumentRecord) -> Result<()> {
        let img = serde_json::to_string(&document.image)?;
        let imgs = serde_json::to_string(&document.images)?;

        sqlx::query(&format!(
            "INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table()
        ))
        .bind(&document.title_path)
        .bind(&document.title)
        .bind(&document.synopsis)
        .bind(&document.content)
        .bind(document.is_published)
        .bind(to_nanos(document.created)?)
        .bind(to_nanos(document.modified)?)
        .bind(img)
        .bind(imgs)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if duplicate {
                WombatError::datastore(
                    format!(
                        "Failed to create {}: duplicate title path {}",
                        self.kind, document.title_path
                    ),
                    e,
                )
            } else {
                WombatError::datastore(format!("Failed to create {}", self.kind), e)
            }
        })?;

        Ok(())
    }

    async fn update_synopsis(
        &self,
        title_path: &str,
        synopsis: &str,
        modified: OffsetDateTime,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET synopsis = ?, modified = ? WHERE title_path = ?",
            self.table()
        ))
        .bind(synopsis)
        .bind(to_nanos(modified)?)
        .bind(title_path)
        .execute(&self.pool)
        .await;

        self.expect_one(result, "synopsis")
    }

    async fn update_content(
        &self,
        title_path: &str,
        content: &str,
        modified: OffsetDateTime,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET content = ?, modified = ? WHERE title_path = ?",
            self.table()
        ))
        .bind(content)
        .bind(to_nanos(modified)?)
        .bind(title_path)
        .execute(&self.pool)
        .await;

        self.expect_one(result, "content")
    }

    async fn delete(&self, title_path: &str) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE title_path = ?", self.table()))
            .bind(title_path)
            .execute(&self.pool)
            .await
            .map_err(|e| WombatError::datastore(format!("Failed to remove {}", self.kind), e))?;

        if result.rows_affected() == 0 {
            return Err(WombatError::NotFound(self.kind.label().to_string()));
        }
        Ok(())
    }

    async fn publish(&self, title_path: &str, publish: bool) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET is_published = ? WHERE title_path = ?",
            self.table()
        ))
        .bind(publish)
        .bind(title_path)
        .execute(&self.pool)
        .await;

        self.expect_one(result, "published status")
    }

    async fn write_image(&self, title_path: &str, image: &Image) -> Result<()> {
        let img = serde_json::to_string(image)?;
        let sql = format!("UPDATE {} SET img = ? WHERE title_path = ?", self.table());
        let result = sqlx::query(&sql)
            .bind(img)
            .bind(title_path)
            .execute(&self.pool)
            .await;

        self.expect_one(result, "image/thumb")
    }

    async fn write_images(&self, title_path: &str, images: &[Image]) -> Result<()> {
        let imgs = serde_json::to_string(images)?;
        let sql = format!("UPDATE {} SET imgs = ? WHERE title_path = ?", self.table());
        let result = sqlx::query(&sql)
            .bind(imgs)
            .bind(title_path)
            .execute(&self.pool)
            .await;

        self.expect_one(result, "images")
    }
}

impl Backend for SqliteBackend {
    fn reader(&self) -> Option<Arc<dyn Reader>> {
        Some(Arc::new(self.clone()))
    }

    fn printer(&self) -> Option<Arc<dyn Printer>> {
        Some(Arc::new(self.clone()))
    }
}
