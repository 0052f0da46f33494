use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

use crate::{
    distance::DistanceConfig,
    geo_point::GeoPoint,
    track_point::TrackPoint,
    walkway::{WalkwayHistoryRequest, WalkwayHistoryResponse},
};

/// One walk along a walkway, from the first fix until the walker stops.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalkSession {
    pub session_id: i64,
    pub walkway_id: i64,
    pub start_time: DateTime<Utc>,
    pub active: bool,
    pub track_points: Vec<TrackPoint>,
    /// Accumulated meters. Only grows while the session is recorded.
    pub distance: f64,
    /// Set once the walk has been submitted as a walkway history.
    pub history: Option<WalkwayHistoryResponse>,

    #[serde(skip)]
    pub config: DistanceConfig,
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for WalkSession {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let blob: Vec<u8> = row.try_get("track_points")?;
        let track_points = crate::track_point::read_track_points(&blob)
            .map_err(|err| sqlx::Error::Decode(err.into()))?;

        let history_id: Option<i64> = row.try_get("history_id")?;
        let can_review: Option<bool> = row.try_get("can_review")?;
        let history = history_id.map(|walkway_history_id| WalkwayHistoryResponse {
            walkway_history_id,
            can_review: can_review.unwrap_or(false),
        });

        Ok(Self {
            session_id: row.try_get("session_id")?,
            walkway_id: row.try_get("walkway_id")?,
            start_time: row.try_get("start_time")?,
            active: row.try_get("active")?,
            track_points,
            distance: row.try_get("distance")?,
            history,
            config: DistanceConfig::default(),
        })
    }
}

impl WalkSession {
    pub fn new(session_id: i64, walkway_id: i64, start_time: DateTime<Utc>, active: bool, config: DistanceConfig) -> Self {
        Self {
            session_id,
            walkway_id,
            start_time,
            active,
            track_points: Vec::new(),
            distance: 0.0,
            history: None,
            config,
        }
    }

    /// Rebuilds a session by replaying already recorded fixes.
    pub fn from_track_points(
        session_id: i64,
        walkway_id: i64,
        start_time: DateTime<Utc>,
        active: bool,
        config: DistanceConfig,
        track_points: impl IntoIterator<Item = TrackPoint>,
    ) -> Self {
        let mut session = Self::new(session_id, walkway_id, start_time, active, config);
        for point in track_points {
            session.push(point);
        }
        session
    }

    /// Appends a fix and returns the meters it added to the total.
    pub fn push(&mut self, point: TrackPoint) -> f64 {
        self.track_points.push(point);
        let step = self.config.incremental_distance(&self.track_points);
        self.distance += step;
        step
    }

    pub fn last_position(&self) -> Option<GeoPoint> {
        self.track_points.last().map(|point| point.position)
    }

    /// Time from the session start to the latest fix.
    pub fn elapsed(&self) -> TimeDelta {
        self.track_points
            .last()
            .map(|point| point.timestamp - self.start_time)
            .filter(|elapsed| *elapsed > TimeDelta::zero())
            .unwrap_or_else(TimeDelta::zero)
    }

    pub fn finish(&mut self) {
        self.active = false;
    }

    pub fn to_history(&self) -> WalkwayHistoryRequest {
        WalkwayHistoryRequest {
            time: self.elapsed().num_seconds(),
            distance: self.distance.round() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::NoiseGate;

    fn fix(lat: f64, lng: f64, seconds: i64) -> TrackPoint {
        TrackPoint::new(GeoPoint::new(lat, lng), DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap())
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn accumulates_steps() {
        let mut session = WalkSession::new(1, 7, start(), true, DistanceConfig::default());
        assert_eq!(session.push(fix(37.0, 127.0, 0)), 0.0);
        let first = session.push(fix(37.0005, 127.0, 10));
        let second = session.push(fix(37.001, 127.0, 20));
        assert!(first > 50.0 && second > 50.0);
        assert_eq!(session.distance, first + second);
        assert_eq!(session.last_position(), Some(GeoPoint::new(37.001, 127.0)));
    }

    #[test]
    fn rejected_step_keeps_total() {
        let mut session = WalkSession::new(1, 7, start(), true, DistanceConfig::default());
        session.push(fix(37.0, 127.0, 0));
        session.push(fix(37.0005, 127.0, 10));
        let before = session.distance;
        assert_eq!(session.push(fix(39.0, 129.0, 20)), 0.0);
        assert_eq!(session.distance, before);
    }

    #[test]
    fn total_never_decreases() {
        let mut session = WalkSession::new(1, 7, start(), true, DistanceConfig::with_gate(NoiseGate::BothAxes));
        let mut last = 0.0;
        for i in 0..50 {
            let jitter = if i % 2 == 0 { 0.00002 } else { -0.00002 };
            session.push(fix(37.0 + i as f64 * 0.0001 + jitter, 127.0 - jitter, i));
            assert!(session.distance >= last);
            last = session.distance;
        }
    }

    #[test]
    fn replay_matches_live_recording() {
        let points: Vec<TrackPoint> = (0..20).map(|i| fix(37.5 + i as f64 * 0.0002, 127.0 + i as f64 * 0.0001, i * 5)).collect();

        let mut live = WalkSession::new(3, 9, start(), true, DistanceConfig::default());
        for point in points.iter().copied() {
            live.push(point);
        }
        let replayed = WalkSession::from_track_points(3, 9, start(), true, DistanceConfig::default(), points);

        assert_eq!(live, replayed);
    }

    #[test]
    fn history_from_session() {
        let mut session = WalkSession::new(1, 7, start(), true, DistanceConfig::default());
        assert_eq!(session.to_history(), WalkwayHistoryRequest { time: 0, distance: 0 });

        session.push(fix(37.0, 127.0, 30));
        session.push(fix(37.008993, 127.0, 630));
        session.finish();

        let history = session.to_history();
        assert!(!session.active);
        assert_eq!(history.time, 630);
        assert!((history.distance - 1000).abs() <= 1);
    }

    #[test]
    fn fix_before_start_has_no_elapsed_time() {
        let mut session = WalkSession::new(1, 7, start(), true, DistanceConfig::default());
        session.push(fix(37.0, 127.0, -60));
        assert_eq!(session.elapsed(), TimeDelta::zero());
    }
}
