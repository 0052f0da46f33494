use std::path::PathBuf;

use thiserror::Error;
use walkway_client::ClientError;
use walkway_lib::distance::DistanceConfig;

pub mod database {
    pub mod constants;
    pub mod db;
}
pub mod buffer {
    #[allow(clippy::module_inception)]
    pub mod buffer;
    pub mod buffer_manager;
}
mod data_manager;
mod gpx_util;
mod history_sync;

pub use buffer::buffer::FixUpdate;
pub use data_manager::*;
pub use gpx_util::read_gpx;
pub use history_sync::SyncReport;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DATABASE_FILE: &str = "database.db";
pub const BUFFER_FILE_DIR: &str = "buffer_files";

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub distance: DistanceConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl DataConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            distance: DistanceConfig::default(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn buffer_file_dir(&self) -> PathBuf {
        self.data_dir.join(BUFFER_FILE_DIR)
    }
}

#[derive(Error, Debug)]
pub enum DataManagerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Buffer error: {0}")]
    BufferManager(String),

    #[error("GPX error: {0}")]
    Gpx(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Walk session {0} is not active")]
    SessionNotActive(i64),

    #[error("Walk session {0} is still being recorded")]
    SessionActive(i64),
}
