use chrono::{DateTime, Utc};
use const_format::concatcp;
use geo_types::Point;
use sqlx::{
    Executor, Pool, Row, Sqlite, SqlitePool, query,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use uuid::Uuid;
use walk_tracker_lib::{gpx, location_point::LocationPoint, walk_session::WalkSession};

use crate::{DATABASE_PATH, SessionStore, StoreError};

use super::constants::*;

/// SQLite-backed session store. Sessions and their points live in two tables
/// linked by a cascading foreign key, so deleting a session drops its points.
#[derive(Clone)]
pub struct WalkDatabase {
    pool: Pool<Sqlite>,
}

impl WalkDatabase {
    pub async fn connect() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(DATABASE_PATH)
            .foreign_keys(true)
            .create_if_missing(true);

        Self::connect_with(options).await
    }

    pub async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|err| StoreError::Storage(format!("failed to connect to database: {err}")))?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// A single-connection in-memory database. SQLite gives every connection
    /// its own `:memory:` instance, so the pool must not grow past one.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|err| StoreError::Storage(format!("failed to connect to database: {err}")))?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.pool
            .execute(concatcp!(
                "CREATE TABLE IF NOT EXISTS ", WALK_SESSIONS_TABLE_NAME, "(",
                SESSION_ID,     " TEXT PRIMARY KEY,",
                START_TIME,     " TIMESTAMP NOT NULL,",
                END_TIME,       " TIMESTAMP,",
                TOTAL_DISTANCE, " REAL NOT NULL)"
            ))
            .await
            .map_err(|err| StoreError::Storage(format!("failed to create session table: {err}")))?;

        self.pool
            .execute(concatcp!(
                "CREATE TABLE IF NOT EXISTS ", LOCATION_POINTS_TABLE_NAME, "(",
                POINT_ID,   " TEXT PRIMARY KEY,",
                SESSION_ID, " TEXT NOT NULL,",
                TIMESTAMP,  " TIMESTAMP NOT NULL,",
                LATITUDE,   " REAL NOT NULL,",
                LONGITUDE,  " REAL NOT NULL,
                FOREIGN KEY(", SESSION_ID, ") REFERENCES ", WALK_SESSIONS_TABLE_NAME, "(", SESSION_ID, ") ON DELETE CASCADE)"
            ))
            .await
            .map_err(|err| StoreError::Storage(format!("failed to create point table: {err}")))?;

        Ok(())
    }

    async fn load_points(&self, session_id: Uuid) -> Result<Vec<LocationPoint>, StoreError> {
        let rows = query(concatcp!(
            "SELECT * FROM ", LOCATION_POINTS_TABLE_NAME,
            " WHERE ", SESSION_ID, " = ?1 ORDER BY ", TIMESTAMP
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to load points: {err}")))?;

        rows.iter().map(point_from_row).collect()
    }

    async fn session_from_row(&self, row: &SqliteRow) -> Result<WalkSession, StoreError> {
        let session_id = parse_id(row.get(0))?;
        let points = self.load_points(session_id).await?;

        Ok(WalkSession {
            session_id,
            start_time: row.get(1),
            end_time: row.get(2),
            total_distance: row.get(3),
            points,
        })
    }
}

impl SessionStore for WalkDatabase {
    async fn create_session(&self, start_time: DateTime<Utc>) -> Result<WalkSession, StoreError> {
        let session = WalkSession::new(Uuid::new_v4(), start_time, None, 0.0, Vec::new());

        query(concatcp!(
            "INSERT INTO ", WALK_SESSIONS_TABLE_NAME,
            "(", SESSION_ID, ", ", START_TIME, ", ", END_TIME, ", ", TOTAL_DISTANCE, ")
            VALUES (?1, ?2, NULL, 0)"
        ))
        .bind(session.session_id.to_string())
        .bind(session.start_time)
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to insert session: {err}")))?;

        Ok(session)
    }

    /// The batch commits as one transaction, and `OR IGNORE` on the point id
    /// makes a re-sent buffer a no-op, so a retried finalize can safely
    /// append the same points again.
    async fn append_points(
        &self,
        session_id: Uuid,
        points: &[LocationPoint],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::Storage(format!("failed to begin transaction: {err}")))?;

        for point in points {
            query(concatcp!(
                "INSERT OR IGNORE INTO ", LOCATION_POINTS_TABLE_NAME,
                "(", POINT_ID, ", ", SESSION_ID, ", ", TIMESTAMP, ", ", LATITUDE, ", ", LONGITUDE, ")
                VALUES (?1, ?2, ?3, ?4, ?5)"
            ))
            .bind(point.point_id.to_string())
            .bind(session_id.to_string())
            .bind(point.timestamp)
            .bind(point.latitude())
            .bind(point.longitude())
            .execute(&mut *tx)
            .await
            .map_err(|err| StoreError::Storage(format!("failed to insert point: {err}")))?;
        }

        tx.commit()
            .await
            .map_err(|err| StoreError::Storage(format!("failed to commit points: {err}")))?;

        Ok(())
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        total_distance: f64,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = query(concatcp!(
            "UPDATE ", WALK_SESSIONS_TABLE_NAME,
            " SET ", TOTAL_DISTANCE, " = ?1, ", END_TIME, " = ?2 WHERE ", SESSION_ID, " = ?3"
        ))
        .bind(total_distance)
        .bind(end_time)
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to finalize session: {err}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session_id));
        }

        Ok(())
    }

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<WalkSession>, StoreError> {
        let row = query(concatcp!(
            "SELECT * FROM ", WALK_SESSIONS_TABLE_NAME, " WHERE ", SESSION_ID, " = ?1"
        ))
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to fetch session: {err}")))?;

        match row {
            Some(row) => Ok(Some(self.session_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_all_sessions(&self) -> Result<Vec<WalkSession>, StoreError> {
        let rows = query(concatcp!(
            "SELECT * FROM ", WALK_SESSIONS_TABLE_NAME, " ORDER BY ", START_TIME
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to fetch sessions: {err}")))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(self.session_from_row(row).await?);
        }

        Ok(sessions)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        let result = query(concatcp!(
            "DELETE FROM ", WALK_SESSIONS_TABLE_NAME, " WHERE ", SESSION_ID, " = ?1"
        ))
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to delete session: {err}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session_id));
        }

        Ok(())
    }

    async fn import_session(&self, gpx_text: &str) -> Result<Option<WalkSession>, StoreError> {
        let Some(session) = gpx::import(gpx_text) else {
            return Ok(None);
        };

        query(concatcp!(
            "INSERT INTO ", WALK_SESSIONS_TABLE_NAME,
            "(", SESSION_ID, ", ", START_TIME, ", ", END_TIME, ", ", TOTAL_DISTANCE, ")
            VALUES (?1, ?2, ?3, ?4)"
        ))
        .bind(session.session_id.to_string())
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.total_distance)
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::Storage(format!("failed to insert imported session: {err}")))?;

        self.append_points(session.session_id, &session.points).await?;

        tracing::info!(
            "imported session {} with {} points",
            session.session_id,
            session.points.len()
        );

        Ok(Some(session))
    }
}

fn parse_id(text: String) -> Result<Uuid, StoreError> {
    Uuid::parse_str(&text).map_err(|err| StoreError::Storage(format!("malformed id {text}: {err}")))
}

fn point_from_row(row: &SqliteRow) -> Result<LocationPoint, StoreError> {
    let latitude: f64 = row.get(3);
    let longitude: f64 = row.get(4);

    Ok(LocationPoint {
        point_id: parse_id(row.get(0))?,
        timestamp: row.get(2),
        position: Point::new(longitude, latitude),
    })
}
