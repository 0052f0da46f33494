//! Incremental path distance for live walk tracking.
//!
//! Every new fix appended to a walk's path contributes the great-circle
//! distance between the previous fix and itself. Steps that the noise gate
//! classifies as outliers contribute nothing. The running total is kept by the
//! caller (see [`crate::walk_session::WalkSession`]); this module only ever
//! looks at the last two points of a path.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::geo_point::GeoPoint;

/// Mean earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Angular delta, in radians, below which a step counts as ordinary movement.
pub const DEFAULT_GATE_THRESHOLD_RAD: f64 = 0.01;

/// How the per-axis angular deltas of a step are combined by the noise gate.
///
/// Deltas are compared signed, exactly as `delta < threshold`, so a step
/// towards the south or west always satisfies its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseGate {
    /// The step is measured when either axis is below the threshold.
    /// A large jump along a single axis is still measured.
    #[default]
    EitherAxis,
    /// The step is measured only when both axes are below the threshold.
    BothAxes,
}

impl NoiseGate {
    pub fn admits(&self, d_lat: f64, d_lng: f64, threshold: f64) -> bool {
        match self {
            NoiseGate::EitherAxis => d_lat < threshold || d_lng < threshold,
            NoiseGate::BothAxes => d_lat < threshold && d_lng < threshold,
        }
    }
}

impl FromStr for NoiseGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "either" | "either_axis" | "or" => Ok(NoiseGate::EitherAxis),
            "both" | "both_axes" | "and" => Ok(NoiseGate::BothAxes),
            other => Err(format!("Unknown noise gate '{other}', expected 'either' or 'both'")),
        }
    }
}

impl fmt::Display for NoiseGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseGate::EitherAxis => write!(f, "either"),
            NoiseGate::BothAxes => write!(f, "both"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConfig {
    pub gate: NoiseGate,
    pub gate_threshold_rad: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            gate: NoiseGate::default(),
            gate_threshold_rad: DEFAULT_GATE_THRESHOLD_RAD,
        }
    }
}

impl DistanceConfig {
    pub fn with_gate(gate: NoiseGate) -> Self {
        Self {
            gate,
            ..Self::default()
        }
    }

    /// Distance in whole meters covered by the most recent step of `path`.
    ///
    /// Returns `0` for paths shorter than two points, for steps rejected by
    /// the noise gate, and for non-finite input. Never panics.
    pub fn incremental_distance<P: AsRef<GeoPoint>>(&self, path: &[P]) -> f64 {
        let [.., previous, last] = path else {
            return 0.0;
        };
        let (previous, last) = (previous.as_ref(), last.as_ref());

        let d_lat = (last.lat - previous.lat).to_radians();
        let d_lng = (last.lng - previous.lng).to_radians();

        if !self.gate.admits(d_lat, d_lng, self.gate_threshold_rad) {
            return 0.0;
        }

        let meters = haversine_meters(previous.lat, last.lat, d_lat, d_lng).round();
        if meters.is_finite() { meters } else { 0.0 }
    }
}

/// [`DistanceConfig::incremental_distance`] with the default gate.
pub fn compute_incremental_distance<P: AsRef<GeoPoint>>(path: &[P]) -> f64 {
    DistanceConfig::default().incremental_distance(path)
}

/// Unrounded, ungated great-circle distance in meters.
pub fn haversine_distance(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();
    haversine_meters(from.lat, to.lat, d_lat, d_lng)
}

fn haversine_meters(lat1: f64, lat2: f64, d_lat: f64, d_lng: f64) -> f64 {
    // Rounding can push `a` just past 1 for near-antipodal points
    let a = ((d_lat / 2.).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.).sin().powi(2))
        .clamp(0., 1.);
    let c = 2. * a.sqrt().atan2((1. - a).sqrt());
    EARTH_RADIUS_KM * c * 1000.
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng)
    }

    // asin form of the haversine, written independently of the module code
    fn reference_meters(a: GeoPoint, b: GeoPoint) -> f64 {
        let (phi1, phi2) = (a.lat.to_radians(), b.lat.to_radians());
        let dphi = phi2 - phi1;
        let dlambda = (b.lng - a.lng).to_radians();
        let h = (dphi / 2.).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.).sin().powi(2);
        2. * EARTH_RADIUS_KM * 1000. * h.sqrt().asin()
    }

    #[test]
    fn short_paths_are_zero() {
        let empty: [GeoPoint; 0] = [];
        assert_eq!(compute_incremental_distance(&empty), 0.0);
        assert_eq!(compute_incremental_distance(&[p(37.5, 127.0)]), 0.0);
    }

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(compute_incremental_distance(&[p(37.5, 127.0), p(37.5, 127.0)]), 0.0);
    }

    #[test]
    fn jitter_step_matches_reference() {
        let (a, b) = (p(37.5, 127.0), p(37.5001, 127.0001));
        let measured = compute_incremental_distance(&[a, b]);
        assert!(measured > 0.0);
        assert!((measured - reference_meters(a, b)).abs() <= 1.0, "{measured}");
        assert_eq!(measured.fract(), 0.0);
    }

    #[test]
    fn one_kilometre_along_meridian() {
        let measured = compute_incremental_distance(&[p(37.0, 127.0), p(37.008993, 127.0)]);
        assert!((measured - 1000.0).abs() <= 1.0, "{measured}");
    }

    #[test]
    fn large_single_axis_jump_passes_either_gate() {
        let path = [p(37.0, 127.0), p(38.0, 127.0)];
        let measured = compute_incremental_distance(&path);
        assert!((measured - reference_meters(path[0], path[1])).abs() <= 1.0, "{measured}");

        assert_eq!(DistanceConfig::with_gate(NoiseGate::BothAxes).incremental_distance(&path), 0.0);
    }

    #[test]
    fn diagonal_jump_is_dropped() {
        let path = [p(37.0, 127.0), p(39.0, 129.0)];
        assert_eq!(compute_incremental_distance(&path), 0.0);
        assert_eq!(DistanceConfig::with_gate(NoiseGate::BothAxes).incremental_distance(&path), 0.0);
    }

    #[test]
    fn deltas_are_compared_signed() {
        // south-west diagonal: both deltas negative, so both gates admit it
        let path = [p(39.0, 129.0), p(37.0, 127.0)];
        let expected = reference_meters(path[0], path[1]);
        assert!((compute_incremental_distance(&path) - expected).abs() <= 1.0);
        assert!((DistanceConfig::with_gate(NoiseGate::BothAxes).incremental_distance(&path) - expected).abs() <= 1.0);
    }

    #[test]
    fn only_last_step_counts() {
        let path = [p(37.0, 127.0), p(37.01, 127.0), p(37.01, 127.0)];
        assert_eq!(compute_incremental_distance(&path), 0.0);
    }

    #[test]
    fn idempotent() {
        let path = vec![p(37.5, 127.0), p(37.5003, 127.0002)];
        assert_eq!(compute_incremental_distance(&path), compute_incremental_distance(&path));
    }

    #[test]
    fn non_finite_input_is_zero() {
        assert_eq!(compute_incremental_distance(&[p(37.5, 127.0), p(f64::NAN, 127.0)]), 0.0);
        assert_eq!(compute_incremental_distance(&[p(37.5, 127.0), p(37.5, f64::INFINITY)]), 0.0);
    }

    #[test]
    fn antipodal_steps_measure_half_the_circumference() {
        let half_circumference = (std::f64::consts::PI * EARTH_RADIUS_KM * 1000.).round();
        for lat in 1..90 {
            let lat = lat as f64;
            let measured = compute_incremental_distance(&[p(lat, 0.0), p(-lat, 180.0)]);
            assert!((measured - half_circumference).abs() <= 1.0, "lat {lat}: {measured}");
        }
    }

    #[test]
    fn gate_parsing() {
        assert_eq!("OR".parse::<NoiseGate>().unwrap(), NoiseGate::EitherAxis);
        assert_eq!("both".parse::<NoiseGate>().unwrap(), NoiseGate::BothAxes);
        assert!("sometimes".parse::<NoiseGate>().is_err());
        assert_eq!(NoiseGate::BothAxes.to_string().parse::<NoiseGate>().unwrap(), NoiseGate::BothAxes);
    }

    #[test]
    fn haversine_is_symmetric() {
        let (a, b) = (p(37.5665, 126.978), p(35.1796, 129.0756));
        assert!((haversine_distance(&a, &b) - haversine_distance(&b, &a)).abs() < 1e-6);
        assert!((haversine_distance(&a, &b) - reference_meters(a, b)).abs() < 1e-3);
    }
}
