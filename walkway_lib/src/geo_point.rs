use geo_types::{Coord, Point};
use serde::{Deserialize, Serialize};

/// A geographic position in degrees, as reported by a geolocation fix.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl AsRef<GeoPoint> for GeoPoint {
    fn as_ref(&self) -> &GeoPoint {
        self
    }
}

// geo-types uses x = longitude, y = latitude
impl From<Coord> for GeoPoint {
    fn from(coord: Coord) -> Self {
        Self::new(coord.y, coord.x)
    }
}

impl From<Point> for GeoPoint {
    fn from(point: Point) -> Self {
        point.0.into()
    }
}

impl From<GeoPoint> for Coord {
    fn from(point: GeoPoint) -> Self {
        geo_types::coord! { x: point.lng, y: point.lat }
    }
}

impl From<GeoPoint> for Point {
    fn from(point: GeoPoint) -> Self {
        Point::from(Coord::from(point))
    }
}

#[test]
fn geo_types_axis_order() {
    let point = GeoPoint::new(37.5665, 126.978);
    let coord: Coord = point.into();
    assert_eq!(coord.x, 126.978);
    assert_eq!(coord.y, 37.5665);
    assert_eq!(GeoPoint::from(Point::from(point)), point);
}
