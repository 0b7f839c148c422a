use chrono::{DateTime, Utc};
use uuid::Uuid;
use walk_tracker_lib::{location_point::LocationPoint, walk_session::WalkSession};

use crate::StoreError;

/// The persistence boundary the tracking engine finalizes sessions against.
///
/// Implementations own their concurrency control; every call is an async
/// request/response with storage failures propagated, never swallowed.
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Creates a durable, not-yet-finalized session record.
    async fn create_session(&self, start_time: DateTime<Utc>) -> Result<WalkSession, StoreError>;

    async fn append_points(
        &self,
        session_id: Uuid,
        points: &[LocationPoint],
    ) -> Result<(), StoreError>;

    /// Commits the final total and end time. `NotFound` for an unknown id.
    async fn finalize_session(
        &self,
        session_id: Uuid,
        total_distance: f64,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<WalkSession>, StoreError>;

    /// All sessions ordered by start time ascending, points ordered by timestamp.
    async fn fetch_all_sessions(&self) -> Result<Vec<WalkSession>, StoreError>;

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError>;

    /// Parses GPX text and stores the resulting session, already finalized.
    /// Text without a single matching waypoint is `Ok(None)`, not an error.
    async fn import_session(&self, gpx_text: &str) -> Result<Option<WalkSession>, StoreError>;
}
