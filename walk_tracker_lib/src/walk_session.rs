use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location_point::LocationPoint;

/// One walk record. `end_time` is set iff the session has been finalized;
/// `total_distance` is the pairwise geodesic sum over `points` in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkSession {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_distance: f64,
    pub points: Vec<LocationPoint>,
}

impl WalkSession {
    pub fn new(
        session_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        total_distance: f64,
        points: Vec<LocationPoint>,
    ) -> Self {
        Self {
            session_id,
            start_time,
            end_time,
            total_distance,
            points,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }
}
