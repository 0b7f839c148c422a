pub mod distance;
pub mod gpx;
pub mod location_point;
pub mod walk_session;
