pub const WALK_SESSIONS_TABLE_NAME: &str = "WalkSessions";
pub const SESSION_ID: &str = "session_id";
pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const TOTAL_DISTANCE: &str = "total_distance";

pub const LOCATION_POINTS_TABLE_NAME: &str = "LocationPoints";
pub const POINT_ID: &str = "point_id";
pub const TIMESTAMP: &str = "timestamp";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
