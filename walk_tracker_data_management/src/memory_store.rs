use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;
use walk_tracker_lib::{gpx, location_point::LocationPoint, walk_session::WalkSession};

use crate::{SessionStore, StoreError};

/// In-memory session store. Backs the engine tests and works as a lightweight
/// gateway when nothing needs to survive a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<Mutex<HashMap<Uuid, WalkSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    async fn create_session(&self, start_time: DateTime<Utc>) -> Result<WalkSession, StoreError> {
        let session = WalkSession::new(Uuid::new_v4(), start_time, None, 0.0, Vec::new());
        self.sessions
            .lock()
            .await
            .insert(session.session_id, session.clone());

        Ok(session)
    }

    async fn append_points(
        &self,
        session_id: Uuid,
        points: &[LocationPoint],
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::NotFound(session_id))?;
        session.points.extend_from_slice(points);

        Ok(())
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        total_distance: f64,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::NotFound(session_id))?;
        session.total_distance = total_distance;
        session.end_time = Some(end_time);

        Ok(())
    }

    async fn fetch_session(&self, session_id: Uuid) -> Result<Option<WalkSession>, StoreError> {
        Ok(self.sessions.lock().await.get(&session_id).cloned())
    }

    async fn fetch_all_sessions(&self) -> Result<Vec<WalkSession>, StoreError> {
        let mut sessions: Vec<WalkSession> =
            self.sessions.lock().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));

        Ok(sessions)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .remove(&session_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(session_id))
    }

    async fn import_session(&self, gpx_text: &str) -> Result<Option<WalkSession>, StoreError> {
        let Some(session) = gpx::import(gpx_text) else {
            return Ok(None);
        };

        self.sessions
            .lock()
            .await
            .insert(session.session_id, session.clone());

        Ok(Some(session))
    }
}
