use crate::types::{AggregatorError, NewsItem, NewsPage, NewsRecord, Result};
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Connection, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news_items (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        title        TEXT    NOT NULL CHECK (title <> ''),
        url          TEXT    NOT NULL UNIQUE CHECK (url <> ''),
        summary      TEXT    NOT NULL DEFAULT '',
        published_at TEXT    NOT NULL,
        source_name  TEXT    NOT NULL,
        category     TEXT    NOT NULL DEFAULT '',
        fetched_at   TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_published_at ON news_items (published_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_source_name ON news_items (source_name)",
];

/// SQLite-backed item store keyed by `url`.
#[derive(Clone)]
pub struct NewsStore {
    pool: SqlitePool,
}

impl NewsStore {
    /// Connect to `database_url` (e.g. `sqlite://news.db` or `sqlite::memory:`),
    /// creating the database file when needed.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database is a separate database.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(AggregatorError::StorageUnavailable)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("News item schema ensured");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert new items and merge into existing ones (same `url`).
    ///
    /// On conflict the stored summary is replaced only by a non-empty one,
    /// `fetched_at` always moves forward to the incoming value, and every
    /// other column keeps its first-written value. Each item is its own
    /// transaction; an item rejected by a constraint is logged and skipped.
    ///
    /// Fails with `StorageUnavailable` when the connection itself breaks, or
    /// when every item in the batch failed for a reason other than a
    /// constraint. Otherwise returns how many items were genuinely new rows.
    pub async fn upsert(&self, items: &[NewsItem]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(AggregatorError::StorageUnavailable)?;

        let mut inserted = 0u64;
        let mut failed = 0usize;
        let mut storage_error = None;

        for item in items {
            match upsert_one(&mut conn, item).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(source) if is_connection_error(&source) => {
                    error!("Storage connection lost while writing {}: {}", item.url, source);
                    return Err(AggregatorError::StorageUnavailable(source));
                }
                Err(source) => {
                    failed += 1;
                    let rejected = is_constraint_error(&source);
                    let e = AggregatorError::StorageWrite {
                        url: item.url.clone(),
                        source,
                    };
                    error!("{}", e);
                    if !rejected {
                        storage_error = Some(e);
                    }
                }
            }
        }

        info!(
            "Stored {} new items out of {} total items ({} failed)",
            inserted,
            items.len(),
            failed
        );

        if failed == items.len() {
            if let Some(AggregatorError::StorageWrite { source, .. }) = storage_error {
                return Err(AggregatorError::StorageUnavailable(source));
            }
        }
        Ok(inserted)
    }

    /// Newest first: `published_at` descending, then `fetched_at` descending.
    pub async fn list_items(&self, limit: i64, offset: i64) -> Result<Vec<NewsRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, url, summary, published_at, source_name, category, fetched_at
            FROM   news_items
            ORDER  BY published_at DESC, fetched_at DESC
            LIMIT  ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn page(&self, limit: i64, offset: i64) -> Result<NewsPage> {
        let items = self.list_items(limit, offset).await?;
        let total = self.count().await?;
        Ok(NewsPage {
            total,
            limit,
            offset,
            items,
        })
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<NewsRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, url, summary, published_at, source_name, category, fetched_at
            FROM   news_items
            WHERE  url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}

async fn upsert_one(
    conn: &mut SqliteConnection,
    item: &NewsItem,
) -> std::result::Result<bool, sqlx::Error> {
    let mut tx = conn.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO news_items
            (title, url, summary, published_at, source_name, category, fetched_at)
        VALUES
            (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(url) DO NOTHING
        "#,
    )
    .bind(&item.title)
    .bind(&item.url)
    .bind(&item.summary)
    .bind(encode_timestamp(item.published_at))
    .bind(&item.source_name)
    .bind(&item.category)
    .bind(encode_timestamp(item.fetched_at))
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    if !inserted {
        sqlx::query(
            r#"
            UPDATE news_items
            SET    summary    = CASE WHEN ? <> '' THEN ? ELSE summary END,
                   fetched_at = ?
            WHERE  url = ?
            "#,
        )
        .bind(&item.summary)
        .bind(&item.summary)
        .bind(encode_timestamp(item.fetched_at))
        .bind(&item.url)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(inserted)
}

fn is_connection_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed
    )
}

// The row was bad, not the database.
fn is_constraint_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => !matches!(db.kind(), ErrorKind::Other),
        _ => false,
    }
}

// RFC 3339 in UTC, so text order matches time order.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AggregatorError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn record_from_row(row: &SqliteRow) -> Result<NewsRecord> {
    let published_at: String = row.try_get("published_at")?;
    let fetched_at: String = row.try_get("fetched_at")?;

    Ok(NewsRecord {
        id: row.try_get("id")?,
        item: NewsItem {
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            summary: row.try_get("summary")?,
            published_at: decode_timestamp(&published_at)?,
            source_name: row.try_get("source_name")?,
            category: row.try_get("category")?,
            fetched_at: decode_timestamp(&fetched_at)?,
        },
    })
}
