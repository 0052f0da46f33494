use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo_point::GeoPoint;

/// A single timestamped fix of a walk.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub position: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

impl TrackPoint {
    pub fn new(position: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Self {
            position,
            timestamp,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, &'static str> {
        bincode::serialize(self).map_err(|_| "Failed to serialize TrackPoint")
    }
}

impl AsRef<GeoPoint> for TrackPoint {
    fn as_ref(&self) -> &GeoPoint {
        &self.position
    }
}

impl TryFrom<&[u8]> for TrackPoint {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize_from(value).map_err(|_| "Failed to deserialize TrackPoint")
    }
}

/// Encodes a whole path as one blob, as stored in the sessions table.
pub fn write_track_points(track_points: &[TrackPoint]) -> Result<Vec<u8>, &'static str> {
    bincode::serialize(track_points).map_err(|_| "Failed to serialize track points")
}

pub fn read_track_points(blob: &[u8]) -> Result<Vec<TrackPoint>, &'static str> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    bincode::deserialize(blob).map_err(|_| "Failed to deserialize track points")
}

#[test]
fn track_point_bytes() {
    let point = TrackPoint::new(GeoPoint::new(37.5, 127.0), DateTime::from_timestamp(1_700_000_000, 0).unwrap());
    let bytes = point.to_bytes().unwrap();
    assert_eq!(TrackPoint::try_from(bytes.as_slice()).unwrap(), point);
    assert!(TrackPoint::try_from(&bytes[..4]).is_err());
}

#[test]
fn empty_blob_is_empty_path() {
    assert!(read_track_points(&[]).unwrap().is_empty());
}
