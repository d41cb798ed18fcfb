use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::StoreError;

/// First irregularity recorded for a train
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TrainRecord {
    pub id: i64,
    #[sqlx(rename = "trainNumber")]
    pub train_number: i64,
    #[sqlx(rename = "numStations")]
    pub num_stations: i64,
    #[sqlx(rename = "subTitle")]
    pub sub_title: Option<String>,
}

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS train_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        trainNumber INTEGER,
        numStations INTEGER,
        subTitle TEXT
    )
"#;

const CREATE_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_train_data_train_number
    ON train_data (trainNumber)
"#;

/// SQLite-backed store of irregular trains, one row per train number
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating the file if needed) the database at `database_url`
    pub async fn open(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // In-memory databases live as long as their connection
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Drop any existing table and create it empty
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DROP TABLE IF EXISTS train_data")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
        sqlx::query(CREATE_INDEX).execute(&mut *tx).await?;

        tx.commit().await?;

        info!("Reset train_data table");
        Ok(())
    }

    /// Create the table if missing, keeping existing rows
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn exists(&self, train_number: u32) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM train_data WHERE trainNumber = ?")
            .bind(i64::from(train_number))
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Insert a record unless the train is already stored.
    ///
    /// Returns `true` when a row was added. The check and the write are one
    /// statement, so concurrent callers cannot both insert the same train.
    pub async fn insert(
        &self,
        train_number: u32,
        num_stations: usize,
        sub_title: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO train_data (trainNumber, numStations, subTitle)
            VALUES (?, ?, ?)
            ON CONFLICT(trainNumber) DO NOTHING
            "#,
        )
        .bind(i64::from(train_number))
        .bind(i64::try_from(num_stations).unwrap_or(i64::MAX))
        .bind(sub_title)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(train_number, "Train already stored, skipping");
        }
        Ok(inserted)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM train_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn records(&self) -> Result<Vec<TrainRecord>, StoreError> {
        let records: Vec<TrainRecord> = sqlx::query_as(
            "SELECT id, trainNumber, numStations, subTitle FROM train_data ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
