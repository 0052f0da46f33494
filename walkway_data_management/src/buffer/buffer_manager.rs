use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tokio::{fs::OpenOptions, sync::Mutex};
use walkway_lib::{distance::DistanceConfig, track_point::TrackPoint, walk_session::WalkSession};

use crate::DataManagerError;

use super::buffer::{Buffer, FixUpdate};

pub const BUFFER_FILE_EXTENSION: &str = "walk";
pub const TORN_FILE_EXTENSION: &str = "torn";

/// Keeps the fixes of every active walk, one append-only file per session.
#[derive(Clone)]
pub struct BufferManager {
    buffer_file_dir: PathBuf,
    config: DistanceConfig,
    buffer_map: Arc<Mutex<HashMap<i64, Buffer>>>,
}

impl BufferManager {
    pub async fn start(buffer_file_dir: PathBuf, config: DistanceConfig) -> Result<Self, DataManagerError> {
        // Create dir if it doesn't exist
        if !buffer_file_dir.exists() {
            tokio::fs::create_dir_all(&buffer_file_dir).await
                .map_err(|_| DataManagerError::BufferManager(format!("Failed to create buffer file directory: {:?}", buffer_file_dir)))?;
        }

        // Reopen walks that were still recording when the process stopped
        let mut buffer_map = HashMap::new();
        let entries = buffer_file_dir.read_dir()
            .map_err(|_| DataManagerError::BufferManager(format!("Failed to read buffer files from {:?}", buffer_file_dir)))?;
        for entry in entries {
            let path = entry.map(|entry| entry.path())
                .map_err(|_| DataManagerError::BufferManager(format!("Failed to read buffer files from {:?}", buffer_file_dir)))?;

            if path.extension().and_then(|ext| ext.to_str()) != Some(BUFFER_FILE_EXTENSION) {
                continue;
            }

            let Some(session_id) = path.file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.split('_').next())
                .and_then(|prefix| prefix.parse::<i64>().ok()) else {
                return Err(DataManagerError::BufferManager(format!("Buffer file had illegal path: {:?}", path)));
            };

            let file = OpenOptions::new()
                .read(true)
                .append(true)
                .open(&path).await
                .map_err(|_| DataManagerError::BufferManager(format!("Failed to open buffer file: {:?}", path)))?;

            let Some(buffer) = Buffer::load(file, path.clone(), config).await? else {
                // Crashed before the header was written, no fixes to recover
                let set_aside = path.with_extension(TORN_FILE_EXTENSION);
                tracing::warn!("Buffer file {:?} has no complete header, moving it to {:?}", path, set_aside);
                tokio::fs::rename(&path, &set_aside).await
                    .map_err(|_| DataManagerError::BufferManager(format!("Failed to move aside buffer file: {:?}", path)))?;
                continue;
            };
            tracing::info!("Resumed walk {} with {} fixes", session_id, buffer.session().track_points.len());
            buffer_map.insert(session_id, buffer);
        }

        Ok(BufferManager {
            buffer_file_dir,
            config,
            buffer_map: Arc::new(Mutex::new(buffer_map)),
        })
    }

    pub fn config(&self) -> DistanceConfig {
        self.config
    }

    pub async fn start_session(&self, session: WalkSession) -> Result<(), DataManagerError> {
        if session.session_id < 0 {
            return Err(DataManagerError::BufferManager("Session ID must be set".to_string()));
        }

        let mut buffer_map = self.buffer_map.lock().await;
        if buffer_map.contains_key(&session.session_id) {
            return Err(DataManagerError::BufferManager(format!("Session {} is already buffered", session.session_id)));
        }

        let buffer_file_name = self.buffer_file_dir
            .join(format!("{}_{}", session.session_id, session.walkway_id))
            .with_extension(BUFFER_FILE_EXTENSION);

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&buffer_file_name).await
            .map_err(|_| DataManagerError::BufferManager(format!("Failed to open buffer file: {:?}", buffer_file_name)))?;

        let session_id = session.session_id;
        let session = WalkSession { config: self.config, ..session };
        buffer_map.insert(session_id, Buffer::new(file, buffer_file_name, session).await?);

        Ok(())
    }

    pub async fn append_track_point(&self, session_id: i64, track_point: TrackPoint) -> Result<FixUpdate, DataManagerError> {
        let mut buffer_map = self.buffer_map.lock().await;
        let buffer = buffer_map.get_mut(&session_id).ok_or(DataManagerError::SessionNotActive(session_id))?;
        buffer.add_point(track_point).await
    }

    pub async fn read_session(&self, session_id: i64) -> Result<WalkSession, DataManagerError> {
        let buffer_map = self.buffer_map.lock().await;
        let buffer = buffer_map.get(&session_id).ok_or(DataManagerError::SessionNotActive(session_id))?;
        Ok(buffer.session().clone())
    }

    pub async fn active_session_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.buffer_map.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Removes the buffer and its file, returning the finished walk.
    pub async fn close_session(&self, session_id: i64) -> Result<WalkSession, DataManagerError> {
        let mut buffer_map = self.buffer_map.lock().await;
        let buffer = buffer_map.remove(&session_id).ok_or(DataManagerError::SessionNotActive(session_id))?;

        let buffer_file_name = buffer.path().to_path_buf();
        let session = buffer.close();

        tokio::fs::remove_file(&buffer_file_name).await
            .map_err(|_| DataManagerError::BufferManager(format!("Failed to remove buffer file: {:?}", buffer_file_name)))?;

        Ok(session)
    }
}
