pub const WALK_SESSIONS_TABLE_NAME: &str = "WalkSessions";
pub const SESSION_ID: &str = "session_id";
pub const WALKWAY_ID: &str = "walkway_id";
pub const START_TIME: &str = "start_time";
pub const ACTIVE: &str = "active";
pub const TRACK_POINTS: &str = "track_points";
pub const DISTANCE: &str = "distance";
// Seconds from start to the last fix
pub const DURATION: &str = "duration";
pub const HISTORY_ID: &str = "history_id";
pub const CAN_REVIEW: &str = "can_review";
