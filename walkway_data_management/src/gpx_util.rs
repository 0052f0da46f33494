use std::{fs::File, io::BufReader, path::Path};

use chrono::{DateTime, Utc};
use walkway_lib::{geo_point::GeoPoint, track_point::TrackPoint, walk_session::WalkSession};

use crate::{DataManager, DataManagerError};

impl DataManager {
    /// Records a GPX file as a complete walk along `walkway_id`, fix by fix.
    pub async fn replay_gpx(&self, walkway_id: i64, path: &Path) -> Result<WalkSession, DataManagerError> {
        let track_points = read_gpx(path)?;
        let start_time = track_points.first().map(|point| point.timestamp).unwrap_or_else(Utc::now);

        let session = self.start_walk_at(walkway_id, start_time).await?;
        for point in track_points {
            self.record_fix(session.session_id, point).await?;
        }
        self.end_walk(session.session_id).await
    }
}

/// Reads every track point of a GPX file, tracks and segments in file order.
///
/// Points without a time inherit the previous point's time, or the metadata
/// time for the first point.
pub fn read_gpx(path: &Path) -> Result<Vec<TrackPoint>, DataManagerError> {
    let file = File::open(path).map_err(|err| DataManagerError::Gpx(format!("Failed to open {path:?}: {err}")))?;
    let gpx = gpx::read(BufReader::new(file)).map_err(|err| DataManagerError::Gpx(format!("Failed to parse {path:?}: {err}")))?;

    let mut time = gpx
        .metadata
        .as_ref()
        .and_then(|meta| meta.time.clone())
        .and_then(parse_time)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let mut track_points = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let position = GeoPoint::from(point.point());
                if let Some(point_time) = point.time.and_then(parse_time) {
                    time = point_time;
                }
                track_points.push(TrackPoint::new(position, time));
            }
        }
    }

    Ok(track_points)
}

fn parse_time(time: gpx::Time) -> Option<DateTime<Utc>> {
    let formatted = time.format().ok()?;
    DateTime::parse_from_rfc3339(&formatted)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::DataConfig;

    const WALK_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="walkway-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><time>2024-05-01T08:59:00Z</time></metadata>
  <trk>
    <name>Morning loop</name>
    <trkseg>
      <trkpt lat="37.000000" lon="127.0"><time>2024-05-01T09:00:00Z</time></trkpt>
      <trkpt lat="37.004500" lon="127.0"><time>2024-05-01T09:05:00Z</time></trkpt>
      <trkpt lat="37.008993" lon="127.0"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="37.008993" lon="127.0"><time>2024-05-01T09:12:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    fn write_gpx(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("walk.gpx");
        let mut file = File::create(&path).unwrap();
        file.write_all(WALK_GPX.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_points_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let points = read_gpx(&write_gpx(dir.path())).unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].position, GeoPoint::new(37.0, 127.0));
        assert_eq!(points[2].timestamp, points[1].timestamp);
        assert_eq!(points[3].timestamp.to_rfc3339(), "2024-05-01T09:12:00+00:00");
    }

    #[test]
    fn missing_file_is_gpx_error() {
        assert!(matches!(read_gpx(Path::new("does/not/exist.gpx")), Err(DataManagerError::Gpx(_))));
    }

    #[tokio::test]
    async fn replay_records_finished_walk() {
        let dir = tempfile::tempdir().unwrap();
        let data_manager = DataManager::start(DataConfig::new(dir.path().join("data"))).await.unwrap();

        let session = data_manager.replay_gpx(5, &write_gpx(dir.path())).await.unwrap();

        assert!(!session.active);
        assert_eq!(session.walkway_id, 5);
        assert_eq!(session.track_points.len(), 4);
        assert!((session.distance - 1000.0).abs() <= 2.0, "{}", session.distance);
        assert_eq!(session.to_history().time, 12 * 60);
        assert_eq!(data_manager.pending_histories().await.unwrap().len(), 1);
    }
}
