use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::{Evaluation, Evaluator, GeoClosest, Predicate, PredicateError};
use crate::models::{BoundingBox, GeoPoint, GeoRecord, NewRecord};

/// Errors that can occur when interacting with the record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid record id: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] PredicateError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// SQLite-backed store of geo-tagged records
///
/// Coordinates live in plain REAL columns with a composite index, so a
/// predicate's bounding box can be pushed down as range filters before the
/// exact distance check runs in memory.
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open a store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        Self::from_settings(database_url, Some(max_connections), Some(min_connections), None, None).await
    }

    /// Open a store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Opening SQLite record store: {}", url);

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs.unwrap_or(5)))
            .test_before_acquire(true);

        // Every connection to an in-memory database sees its own empty database
        let pool_options = if url.contains(":memory:") {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(max_connections.unwrap_or(10))
                .min_connections(min_connections.unwrap_or(1))
                .idle_timeout(Duration::from_secs(idle_timeout_secs.unwrap_or(600)))
        };

        let pool = pool_options.connect_with(options).await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Store a new record, assigning its id and creation time
    pub async fn insert(&self, record: NewRecord) -> Result<GeoRecord, StoreError> {
        let record = prepare(record)?;

        insert_row(&self.pool, &record).await?;

        tracing::debug!(
            "Inserted record {} ({}) at ({}, {})",
            record.id,
            record.name,
            record.latitude,
            record.longitude
        );

        Ok(record)
    }

    /// Store several records atomically
    ///
    /// Every record is validated before anything is written; one invalid
    /// coordinate rejects the whole batch.
    pub async fn insert_many(&self, records: Vec<NewRecord>) -> Result<Vec<GeoRecord>, StoreError> {
        let records = records
            .into_iter()
            .map(prepare)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        for record in &records {
            insert_row(&mut *tx, record).await?;
        }
        tx.commit().await?;

        tracing::debug!("Inserted batch of {} records", records.len());

        Ok(records)
    }

    /// Fetch a record by id
    pub async fn get(&self, id: Uuid) -> Result<Option<GeoRecord>, StoreError> {
        let query = r#"
            SELECT id, name, latitude, longitude, tags, created_at
            FROM geo_records
            WHERE id = ?
        "#;

        let row = sqlx::query(query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Fetch a record by id, failing when it does not exist
    pub async fn get_required(&self, id: Uuid) -> Result<GeoRecord, StoreError> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Remove a record, returning whether it existed
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM geo_records WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM geo_records")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("count")?)
    }

    /// Every stored record, oldest first
    pub async fn fetch_all(&self) -> Result<Vec<GeoRecord>, StoreError> {
        let query = r#"
            SELECT id, name, latitude, longitude, tags, created_at
            FROM geo_records
            ORDER BY created_at ASC, id ASC
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// Records whose coordinates fall inside `bbox`, oldest first
    pub async fn fetch_in_box(&self, bbox: &BoundingBox) -> Result<Vec<GeoRecord>, StoreError> {
        let rows = if bbox.spans_all_longitudes() {
            sqlx::query(
                r#"
                SELECT id, name, latitude, longitude, tags, created_at
                FROM geo_records
                WHERE latitude BETWEEN ? AND ?
                ORDER BY created_at ASC, id ASC
                "#,
            )
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .fetch_all(&self.pool)
            .await?
        } else {
            let query = if bbox.crosses_antimeridian() {
                r#"
                SELECT id, name, latitude, longitude, tags, created_at
                FROM geo_records
                WHERE latitude BETWEEN ? AND ?
                  AND (longitude >= ? OR longitude <= ?)
                ORDER BY created_at ASC, id ASC
                "#
            } else {
                r#"
                SELECT id, name, latitude, longitude, tags, created_at
                FROM geo_records
                WHERE latitude BETWEEN ? AND ?
                  AND longitude BETWEEN ? AND ?
                ORDER BY created_at ASC, id ASC
                "#
            };

            sqlx::query(query)
                .bind(bbox.min_lat)
                .bind(bbox.max_lat)
                .bind(bbox.min_lon)
                .bind(bbox.max_lon)
                .fetch_all(&self.pool)
                .await?
        };

        tracing::debug!("Bounding box pre-filter returned {} records", rows.len());

        rows.iter().map(row_to_record).collect()
    }

    /// Evaluate any record predicate against the store
    ///
    /// The predicate's bounds, when present, narrow the candidates in SQL.
    pub async fn find<P>(
        &self,
        predicate: &mut P,
        evaluator: &Evaluator,
    ) -> Result<Evaluation<GeoRecord>, StoreError>
    where
        P: Predicate<GeoRecord> + ?Sized,
    {
        let candidates = match predicate.bounds() {
            Some(bbox) => self.fetch_in_box(&bbox).await?,
            None => self.fetch_all().await?,
        };

        Ok(evaluator.evaluate(predicate, candidates))
    }

    /// Records closest to the predicate's center, nearest first
    pub async fn find_closest(
        &self,
        predicate: &mut GeoClosest,
        limit: Option<usize>,
    ) -> Result<Evaluation<GeoRecord>, StoreError> {
        let evaluator = match limit {
            Some(limit) => Evaluator::with_limit(limit),
            None => Evaluator::new(),
        };

        self.find(predicate, &evaluator).await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn prepare(record: NewRecord) -> Result<GeoRecord, StoreError> {
    GeoPoint::new(record.latitude, record.longitude)?;

    Ok(GeoRecord {
        id: Uuid::new_v4(),
        name: record.name,
        latitude: record.latitude,
        longitude: record.longitude,
        tags: record.tags,
        created_at: Utc::now(),
    })
}

async fn insert_row<'e, E>(executor: E, record: &GeoRecord) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let query = r#"
        INSERT INTO geo_records (id, name, latitude, longitude, tags, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
    "#;

    sqlx::query(query)
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(record.created_at)
        .execute(executor)
        .await?;

    Ok(())
}

fn row_to_record(row: &SqliteRow) -> Result<GeoRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let tags: String = row.try_get("tags")?;

    Ok(GeoRecord {
        id: Uuid::parse_str(&id)?,
        name: row.try_get("name")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        tags: serde_json::from_str(&tags)?,
        created_at: row.try_get("created_at")?,
    })
}
