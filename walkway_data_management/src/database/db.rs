use std::path::Path;

use chrono::{DateTime, Utc};
use const_format::concatcp;
use sqlx::{query, query_as, sqlite::SqliteConnectOptions, Executor, Pool, Sqlite, SqlitePool};
use walkway_lib::{track_point::write_track_points, walk_session::WalkSession, walkway::WalkwayHistoryResponse};

use crate::DataManagerError;

use super::constants::*;

#[derive(Clone)]
pub struct WalkDatabase {
    pool: Pool<Sqlite>,
}

impl WalkDatabase {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database {path:?}: {err}")))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", WALK_SESSIONS_TABLE_NAME, "(",
                SESSION_ID,   " INTEGER PRIMARY KEY AUTOINCREMENT,",
                WALKWAY_ID,   " INTEGER NOT NULL,",
                START_TIME,   " TIMESTAMP NOT NULL,",
                ACTIVE,       " BOOLEAN NOT NULL,",
                TRACK_POINTS, " BLOB NOT NULL,",
                DISTANCE,     " REAL NOT NULL DEFAULT 0,",
                DURATION,     " INTEGER NOT NULL DEFAULT 0,",
                HISTORY_ID,   " INTEGER,",
                CAN_REVIEW,   " BOOLEAN
            )")).await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {err}")))
            .map(|_| ())
    }

    pub async fn insert_walk_session(&self, walkway_id: i64, start_time: DateTime<Utc>, active: bool) -> Result<i64, DataManagerError> {
        query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", WALK_SESSIONS_TABLE_NAME,
            "(", SESSION_ID, ", ", WALKWAY_ID, ", ", START_TIME, ", ", ACTIVE, ", ", TRACK_POINTS, ")
            VALUES (NULL, ?1, ?2, ?3, ?4) RETURNING ", SESSION_ID))
                .bind(walkway_id)
                .bind(start_time)
                .bind(active)
                .bind(Vec::<u8>::new())
                .fetch_one(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert walk session: {err}")))
                .map(|row| row.0)
    }

    pub async fn get_session(&self, session_id: i64) -> Result<WalkSession, DataManagerError> {
        query_as::<_, WalkSession>(concatcp!("SELECT * FROM ", WALK_SESSIONS_TABLE_NAME, " WHERE ", SESSION_ID, " = ?1"))
            .bind(session_id)
            .fetch_one(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get session {session_id}: {err}")))
    }

    pub async fn get_sessions(&self) -> Result<Vec<WalkSession>, DataManagerError> {
        query_as::<_, WalkSession>(concatcp!("SELECT * FROM ", WALK_SESSIONS_TABLE_NAME, " ORDER BY ", SESSION_ID))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get sessions: {err}")))
    }

    pub async fn get_active_session_ids(&self) -> Result<Vec<i64>, DataManagerError> {
        query_as::<_, (i64,)>(concatcp!("SELECT ", SESSION_ID, " FROM ", WALK_SESSIONS_TABLE_NAME, " WHERE ", ACTIVE, " = 1"))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get active sessions: {err}")))
            .map(|rows| rows.into_iter().map(|row| row.0).collect())
    }

    /// Finished walks that have not been submitted as a walkway history yet.
    pub async fn get_pending_histories(&self) -> Result<Vec<WalkSession>, DataManagerError> {
        query_as::<_, WalkSession>(concatcp!("
            SELECT * FROM ", WALK_SESSIONS_TABLE_NAME,
            " WHERE ", ACTIVE, " = 0 AND ", HISTORY_ID, " IS NULL ORDER BY ", SESSION_ID))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get pending histories: {err}")))
    }

    /// Stores the final path and totals of a walk and marks it inactive.
    pub async fn finish_session(&self, session: &WalkSession) -> Result<(), DataManagerError> {
        let blob = write_track_points(&session.track_points)
            .map_err(|err| DataManagerError::Database(err.to_string()))?;

        query(concatcp!("
            UPDATE ", WALK_SESSIONS_TABLE_NAME, " SET ",
                TRACK_POINTS, " = ?1, ",
                DISTANCE,     " = ?2, ",
                DURATION,     " = ?3, ",
                ACTIVE,       " = 0
            WHERE ", SESSION_ID, " = ?4"))
                .bind(blob)
                .bind(session.distance)
                .bind(session.elapsed().num_seconds())
                .bind(session.session_id)
                .execute(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to finish session {}: {err}", session.session_id)))
                .map(|_| ())
    }

    pub async fn set_session_history(&self, session_id: i64, history: &WalkwayHistoryResponse) -> Result<(), DataManagerError> {
        query(concatcp!("UPDATE ", WALK_SESSIONS_TABLE_NAME, " SET ", HISTORY_ID, " = ?1, ", CAN_REVIEW, " = ?2 WHERE ", SESSION_ID, " = ?3"))
            .bind(history.walkway_history_id)
            .bind(history.can_review)
            .bind(session_id)
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to set history of session {session_id}: {err}")))
            .map(|_| ())
    }
}
