use chrono::{DateTime, Utc};
use walkway_lib::{track_point::TrackPoint, walk_session::WalkSession};

use crate::{buffer::{buffer::FixUpdate, buffer_manager::BufferManager}, database::db::WalkDatabase, DataConfig, DataManagerError};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: WalkDatabase,
    pub(crate) buffer_manager: BufferManager,
    pub(crate) config: DataConfig,
}

/// The public interface for recording walks and keeping them until they are submitted.
impl DataManager {
    pub async fn start(config: DataConfig) -> Result<Self, DataManagerError> {
        // Create data dir if it doesn't exist
        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)
                .map_err(|_| DataManagerError::Database(format!("Failed to create data directory: {:?}", config.data_dir)))?;
        }

        let buffer_manager = BufferManager::start(config.buffer_file_dir(), config.distance).await?;
        let database = WalkDatabase::connect(&config.database_path()).await?;

        let buffered = buffer_manager.active_session_ids().await;
        for session_id in database.get_active_session_ids().await? {
            if !buffered.contains(&session_id) {
                tracing::warn!("Walk {} is active but has no buffer, its fixes are lost", session_id);
            }
        }

        tracing::info!("Data manager started in {:?} with {} active walks", config.data_dir, buffered.len());

        Ok(DataManager {
            database,
            buffer_manager,
            config,
        })
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub async fn start_walk(&self, walkway_id: i64) -> Result<WalkSession, DataManagerError> {
        self.start_walk_at(walkway_id, Utc::now()).await
    }

    pub async fn start_walk_at(&self, walkway_id: i64, start_time: DateTime<Utc>) -> Result<WalkSession, DataManagerError> {
        let session_id = self.database.insert_walk_session(walkway_id, start_time, true).await?;
        let session = WalkSession::new(session_id, walkway_id, start_time, true, self.config.distance);
        self.buffer_manager.start_session(session.clone()).await?;
        tracing::info!("Started walk {} on walkway {}", session_id, walkway_id);
        Ok(session)
    }

    /// Records a fix of an active walk and returns the updated distance.
    pub async fn record_fix(&self, session_id: i64, point: TrackPoint) -> Result<FixUpdate, DataManagerError> {
        let update = self.buffer_manager.append_track_point(session_id, point).await?;
        if update.step == 0.0 {
            tracing::trace!("Walk {}: fix at {:?} added no distance", session_id, point.position);
        }
        Ok(update)
    }

    /// The walk as currently known, live from its buffer while it is active.
    pub async fn current_walk(&self, session_id: i64) -> Result<WalkSession, DataManagerError> {
        match self.buffer_manager.read_session(session_id).await {
            Ok(session) => Ok(session),
            Err(DataManagerError::SessionNotActive(_)) => self.stored_session(session_id).await,
            Err(err) => Err(err),
        }
    }

    /// Stores the finished walk, then drops its buffer. The buffer is kept
    /// when the walk could not be stored.
    pub async fn end_walk(&self, session_id: i64) -> Result<WalkSession, DataManagerError> {
        let mut finished = self.buffer_manager.read_session(session_id).await?;
        finished.finish();
        self.database.finish_session(&finished).await?;

        let session = self.buffer_manager.close_session(session_id).await?;
        tracing::info!(
            "Finished walk {}: {} m in {} s over {} fixes",
            session_id,
            session.distance,
            session.elapsed().num_seconds(),
            session.track_points.len()
        );
        Ok(session)
    }

    pub async fn get_sessions(&self) -> Result<Vec<WalkSession>, DataManagerError> {
        let mut sessions = self.database.get_sessions().await?;

        for session in sessions.iter_mut() {
            session.config = self.config.distance;
            if session.active {
                if let Ok(live) = self.buffer_manager.read_session(session.session_id).await {
                    *session = live;
                }
            }
        }

        Ok(sessions)
    }

    pub async fn pending_histories(&self) -> Result<Vec<WalkSession>, DataManagerError> {
        let mut sessions = self.database.get_pending_histories().await?;
        for session in sessions.iter_mut() {
            session.config = self.config.distance;
        }
        Ok(sessions)
    }

    async fn stored_session(&self, session_id: i64) -> Result<WalkSession, DataManagerError> {
        let mut session = self.database.get_session(session_id).await?;
        session.config = self.config.distance;
        Ok(session)
    }
}
