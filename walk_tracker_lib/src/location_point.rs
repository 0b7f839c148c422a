use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded GPS fix. Immutable once created; the id is unique within a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub point_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub position: Point<f64>,
}

impl LocationPoint {
    pub fn new(position: Point<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            point_id: Uuid::new_v4(),
            timestamp,
            position,
        }
    }

    pub fn from_coordinates(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(Point::new(longitude, latitude), timestamp)
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }
}
