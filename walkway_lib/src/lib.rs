pub mod distance;
pub mod geo_point;
pub mod track_point;
pub mod walk_session;
pub mod walkway;
