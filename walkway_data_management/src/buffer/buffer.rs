use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use walkway_lib::{distance::DistanceConfig, track_point::TrackPoint, walk_session::WalkSession};

use crate::DataManagerError;

/// Written once at the start of every buffer file, followed by the fixes.
#[derive(Serialize, Deserialize)]
struct BufferHeader {
    session_id: i64,
    walkway_id: i64,
    start_time: DateTime<Utc>,
}

/// Outcome of recording one fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixUpdate {
    /// Meters this fix added.
    pub step: f64,
    /// Meters walked so far in the session.
    pub total: f64,
}

/// Fixes of one active walk, mirrored to an append-only file.
pub struct Buffer {
    file: File,
    path: PathBuf,
    session: WalkSession,
    // Bytes of the file holding complete records
    len: u64,
}

impl Buffer {
    /// Starts the file over with a header for `session`, followed by any fixes
    /// the session already has.
    pub async fn new(file: File, path: PathBuf, session: WalkSession) -> Result<Self, DataManagerError> {
        let header = BufferHeader {
            session_id: session.session_id,
            walkway_id: session.walkway_id,
            start_time: session.start_time,
        };
        let bytes = bincode::serialize(&header)
            .map_err(|_| DataManagerError::BufferManager("Failed to serialize buffer header".to_string()))?;

        let mut session = session;
        let track_points = std::mem::take(&mut session.track_points);
        session.distance = 0.0;

        let mut buffer = Self { file, path, session, len: 0 };
        buffer.discard_partial_write().await?;
        buffer.write_record(&bytes).await?;
        for point in track_points {
            buffer.add_point(point).await?;
        }

        Ok(buffer)
    }

    /// Reads a buffer file back and replays its fixes. A partially written
    /// trailing fix is dropped.
    ///
    /// Returns `None` when the file does not start with a complete header.
    pub async fn load(mut file: File, path: PathBuf, config: DistanceConfig) -> Result<Option<Self>, DataManagerError> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await
            .map_err(|_| DataManagerError::BufferManager(format!("Failed to read buffer file {path:?}")))?;

        let mut cursor = std::io::Cursor::new(bytes);
        let Ok(header) = bincode::deserialize_from::<_, BufferHeader>(&mut cursor) else {
            return Ok(None);
        };

        let file_len = cursor.get_ref().len() as u64;
        let mut valid_len = cursor.position();
        let mut track_points = Vec::new();
        while let Ok(track_point) = bincode::deserialize_from::<_, TrackPoint>(&mut cursor) {
            track_points.push(track_point);
            valid_len = cursor.position();
        }

        let session = WalkSession::from_track_points(header.session_id, header.walkway_id, header.start_time, true, config, track_points);
        let mut buffer = Self { file, path, session, len: valid_len };

        // Cut off the torn write so that new fixes follow the last complete one
        if valid_len < file_len {
            tracing::warn!("Dropping {} trailing bytes of {:?}", file_len - valid_len, buffer.path);
            buffer.discard_partial_write().await?;
        }

        Ok(Some(buffer))
    }

    pub async fn add_point(&mut self, point: TrackPoint) -> Result<FixUpdate, DataManagerError> {
        let bytes = point.to_bytes()
            .map_err(|err| DataManagerError::BufferManager(err.to_string()))?;
        self.write_record(&bytes).await?;

        let step = self.session.push(point);
        Ok(FixUpdate { step, total: self.session.distance })
    }

    /// Appends one complete record. A failed write is cut back off the file so
    /// that later records stay readable.
    async fn write_record(&mut self, bytes: &[u8]) -> Result<(), DataManagerError> {
        let written = match self.file.write_all(bytes).await {
            Ok(()) => self.file.flush().await,
            Err(err) => Err(err),
        };

        if let Err(err) = written {
            tracing::error!("Failed to write to {:?}: {}", self.path, err);
            self.discard_partial_write().await?;
            return Err(DataManagerError::BufferManager(format!("Failed to write to {:?}: {err}", self.path)));
        }

        self.len += bytes.len() as u64;
        Ok(())
    }

    /// Truncates the file to the last complete record.
    pub(crate) async fn discard_partial_write(&mut self) -> Result<(), DataManagerError> {
        self.file.set_len(self.len).await
            .map_err(|_| DataManagerError::BufferManager(format!("Failed to truncate buffer file {:?}", self.path)))
    }

    pub fn session(&self) -> &WalkSession {
        &self.session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(self) -> WalkSession {
        let mut session = self.session;
        session.finish();
        session
    }
}
