//! SQLite record store for the whitelist request bot.
//!
//! Implements [`RecordStore`] over a single `whitelist_requests` table using
//! sqlx. The schema ships as embedded migrations (see `migrations/`) and is
//! applied with [`SqliteRecordStore::migrate`].
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text, so ordering by the
//! column is chronological. The username column is `COLLATE NOCASE`.
//!
//! Databases left by earlier deployments are rewritten by the second
//! migration: status labels become canonical names, offset-less local times
//! become UTC, and the table is rebuilt with `NOCASE`. Queries can therefore
//! compare `status` against canonical names only.
//!
//! # Example
//!
//! ```no_run
//! use whitelist_sqlite::SqliteRecordStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteRecordStore::connect("sqlite://whitelist.db?mode=rwc", 5).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use whitelist_core::record_store::{RecordStore, RecordStoreError, StoreFuture};
use whitelist_core::request::{GameAccount, Processing, RequestStatus, UserId, WhitelistRequest};

const SELECT_COLUMNS: &str = "SELECT discord_id, discord_tag, minecraft_username, request_time, \
     status, processed_by, processed_time FROM whitelist_requests";

/// `ORDER BY` picking the most relevant request for one account
const RELEVANCE_ORDER: &str = "ORDER BY CASE status WHEN 'APPROVED' THEN 0 WHEN 'TICKET' THEN 1 \
     WHEN 'PENDING' THEN 2 ELSE 3 END, request_time DESC LIMIT 1";

/// [`RecordStore`] backed by a SQLite connection pool.
#[derive(Clone, Debug)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::DatabaseError`] if the database cannot be opened.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RecordStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| RecordStoreError::DatabaseError(e.to_string()))?;

        tracing::info!(max_connections, "Connected to record store");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RecordStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RecordStoreError::DatabaseError(e.to_string()))?;

        tracing::info!("Record store migrations applied");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_list(&self, sql: String, status: Option<RequestStatus>) -> Result<Vec<WhitelistRequest>, RecordStoreError> {
        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(row_to_request).collect()
    }
}

impl RecordStore for SqliteRecordStore {
    fn create(&self, record: WhitelistRequest) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let (processed_by, processed_time) = match &record.processed {
                Some(p) => (Some(p.by.clone()), Some(encode_time(p.at))),
                None => (None, None),
            };

            sqlx::query(
                r"
                INSERT INTO whitelist_requests (
                    discord_id, discord_tag, minecraft_username, request_time,
                    status, processed_by, processed_time
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(discord_id) DO UPDATE SET
                    discord_tag = excluded.discord_tag,
                    minecraft_username = excluded.minecraft_username,
                    request_time = excluded.request_time,
                    status = excluded.status,
                    processed_by = excluded.processed_by,
                    processed_time = excluded.processed_time
                ",
            )
            .bind(record.submitter_id.as_str())
            .bind(&record.submitter_tag)
            .bind(record.game_account.as_str())
            .bind(encode_time(record.requested_at))
            .bind(record.status.as_str())
            .bind(processed_by)
            .bind(processed_time)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

            tracing::debug!(
                submitter = %record.submitter_id,
                account = %record.game_account,
                status = %record.status,
                "Request stored"
            );
            metrics::counter!("record_store.writes", "op" => "create").increment(1);
            Ok(())
        })
    }

    fn get_by_submitter(&self, submitter: UserId) -> StoreFuture<'_, Option<WhitelistRequest>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE discord_id = ?"))
                .bind(submitter.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

            row.as_ref().map(row_to_request).transpose()
        })
    }

    fn get_by_game_account(
        &self,
        name: String,
        case_insensitive: bool,
    ) -> StoreFuture<'_, Option<WhitelistRequest>> {
        Box::pin(async move {
            let filter = if case_insensitive {
                "WHERE minecraft_username = ? COLLATE NOCASE"
            } else {
                "WHERE minecraft_username = ? COLLATE BINARY"
            };
            let row = sqlx::query(&format!("{SELECT_COLUMNS} {filter} {RELEVANCE_ORDER}"))
                .bind(&name)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

            row.as_ref().map(row_to_request).transpose()
        })
    }

    fn update(&self, record: WhitelistRequest) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let (processed_by, processed_time) = match &record.processed {
                Some(p) => (Some(p.by.clone()), Some(encode_time(p.at))),
                None => (None, None),
            };

            let result = sqlx::query(
                r"
                UPDATE whitelist_requests
                SET discord_tag = ?, minecraft_username = ?, request_time = ?,
                    status = ?, processed_by = ?, processed_time = ?
                WHERE discord_id = ?
                ",
            )
            .bind(&record.submitter_tag)
            .bind(record.game_account.as_str())
            .bind(encode_time(record.requested_at))
            .bind(record.status.as_str())
            .bind(processed_by)
            .bind(processed_time)
            .bind(record.submitter_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

            metrics::counter!("record_store.writes", "op" => "update").increment(1);
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete(&self, submitter: UserId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM whitelist_requests WHERE discord_id = ?")
                .bind(submitter.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_error)?;

            metrics::counter!("record_store.writes", "op" => "delete").increment(1);
            Ok(result.rows_affected() > 0)
        })
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<WhitelistRequest>> {
        Box::pin(self.fetch_list(format!("{SELECT_COLUMNS} ORDER BY request_time DESC"), None))
    }

    fn list_by_status(&self, status: RequestStatus) -> StoreFuture<'_, Vec<WhitelistRequest>> {
        Box::pin(self.fetch_list(
            format!("{SELECT_COLUMNS} WHERE status = ? ORDER BY request_time DESC"),
            Some(status),
        ))
    }

    fn count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM whitelist_requests")
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    fn count_by_status(&self, status: RequestStatus) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM whitelist_requests WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_error)?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }
}

#[allow(clippy::needless_pass_by_value)] // Used as map_err(db_error)
fn db_error(error: sqlx::Error) -> RecordStoreError {
    tracing::error!(error = %error, "Record store query failed");
    metrics::counter!("record_store.errors").increment(1);
    RecordStoreError::DatabaseError(error.to_string())
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, RecordStoreError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    // Offset-less local time written before migration, read as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|t| t.and_utc())
        .map_err(|e| RecordStoreError::CorruptRecord(format!("bad timestamp {raw:?}: {e}")))
}

/// Convert a database row to a `WhitelistRequest`.
fn row_to_request(row: &SqliteRow) -> Result<WhitelistRequest, RecordStoreError> {
    let get = |column: &str| -> Result<String, RecordStoreError> {
        row.try_get(column).map_err(|e| RecordStoreError::CorruptRecord(e.to_string()))
    };
    let get_opt = |column: &str| -> Result<Option<String>, RecordStoreError> {
        row.try_get(column).map_err(|e| RecordStoreError::CorruptRecord(e.to_string()))
    };

    let status_raw = get("status")?;
    let status = status_raw
        .parse::<RequestStatus>()
        .map_err(|e| RecordStoreError::CorruptRecord(e.to_string()))?;

    let processed = match (get_opt("processed_by")?, get_opt("processed_time")?) {
        (Some(by), Some(at)) => Some(Processing { by, at: decode_time(&at)? }),
        _ => None,
    };

    Ok(WhitelistRequest {
        submitter_id: UserId::new(get("discord_id")?),
        submitter_tag: get("discord_tag")?,
        game_account: GameAccount::from_stored(get("minecraft_username")?),
        requested_at: decode_time(&get("request_time")?)?,
        status,
        processed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_times_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        let (a, b) = (encode_time(early), encode_time(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2024-09-01T08:00:00.000000Z");
        assert_eq!(decode_time(&b).unwrap(), late);
    }

    #[test]
    fn offset_less_times_read_as_utc() {
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        assert_eq!(decode_time("2024-09-01T08:00").unwrap(), at);
        assert_eq!(
            decode_time("2024-09-01T08:00:05.123").unwrap(),
            at + chrono::Duration::milliseconds(5123)
        );
    }

    #[test]
    fn garbage_timestamp_is_a_corrupt_record() {
        assert!(matches!(decode_time("yesterday"), Err(RecordStoreError::CorruptRecord(_))));
    }
}
