use std::sync::Arc;

use chrono::Utc;
use geo_types::Point;
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;
use walk_tracker_data_management::SessionStore;
use walk_tracker_lib::{gpx, walk_session::WalkSession};

use crate::{
    TrackerError,
    location_source::LocationSource,
    state::{TrackerCore, TrackingState},
};

/// Drives one walk at a time: owns the live buffer, toggles the location
/// stream on state transitions, and finalizes stopped sessions against the
/// store. Samples are applied one at a time by a single ingest task, so
/// arrival order is the processing order.
pub struct WalkTracker<S, L> {
    core: Arc<Mutex<TrackerCore>>,
    store: S,
    source: L,
    ingest: Option<JoinHandle<()>>,
}

impl<S: SessionStore, L: LocationSource> WalkTracker<S, L> {
    pub fn new(store: S, source: L) -> Self {
        Self {
            core: Arc::new(Mutex::new(TrackerCore::new())),
            store,
            source,
            ingest: None,
        }
    }

    pub async fn tracking_state(&self) -> TrackingState {
        self.core.lock().await.tracking()
    }

    pub async fn point_count(&self) -> usize {
        self.core.lock().await.points().len()
    }

    pub async fn total_distance(&self) -> f64 {
        self.core.lock().await.total_distance()
    }

    pub async fn start(&mut self) -> Result<(), TrackerError> {
        self.core.lock().await.start(Utc::now())?;
        self.begin_ingest();
        tracing::info!("tracking started");

        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), TrackerError> {
        self.core.lock().await.pause()?;
        self.halt_ingest();
        tracing::info!("tracking paused");

        Ok(())
    }

    pub async fn resume(&mut self) -> Result<(), TrackerError> {
        self.core.lock().await.resume()?;
        self.begin_ingest();
        tracing::info!("tracking resumed");

        Ok(())
    }

    /// Stops the stream and finalizes the session. The buffer is cleared and
    /// the state becomes `Stopped` only once every store step confirmed; on
    /// failure the buffer stays, the error goes up, and `stop` may be retried
    /// to resume from the first incomplete step.
    pub async fn stop(&mut self) -> Result<WalkSession, TrackerError> {
        self.core.lock().await.begin_stop()?;
        self.halt_ingest();

        match self.finalize().await {
            Ok(session) => {
                tracing::info!(
                    "session {} finalized: {} points, {:.1} m",
                    session.session_id,
                    session.points.len(),
                    session.total_distance,
                );
                Ok(session)
            }
            Err(err) => {
                tracing::warn!("finalize failed, buffer retained for retry: {err}");
                Err(err)
            }
        }
    }

    /// Renders a stored session as GPX text, `None` for an unknown id.
    pub async fn export_session(
        &self,
        session_id: Uuid,
        precision_meters: f64,
    ) -> Result<Option<String>, TrackerError> {
        let session = self.store.fetch_session(session_id).await?;

        Ok(session.map(|session| gpx::export(&session.points, precision_meters)))
    }

    pub async fn import_session(
        &self,
        gpx_text: &str,
    ) -> Result<Option<WalkSession>, TrackerError> {
        Ok(self.store.import_session(gpx_text).await?)
    }

    pub async fn sessions(&self) -> Result<Vec<WalkSession>, TrackerError> {
        Ok(self.store.fetch_all_sessions().await?)
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), TrackerError> {
        Ok(self.store.delete_session(session_id).await?)
    }

    fn begin_ingest(&mut self) {
        let mut rx = self.source.start_updates();
        let core = self.core.clone();

        self.ingest = Some(tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                let mut core = core.lock().await;
                core.record_sample(Point::new(sample.longitude, sample.latitude), Utc::now());
                tracing::debug!("sample applied, {} points buffered", core.points().len());
            }
        }));
    }

    fn halt_ingest(&mut self) {
        self.source.stop_updates();
        if let Some(handle) = self.ingest.take() {
            handle.abort();
        }
    }

    async fn finalize(&mut self) -> Result<WalkSession, TrackerError> {
        let (start_time, points, total_distance, progress) = {
            let core = self.core.lock().await;
            (
                core.session_start().unwrap_or_else(Utc::now),
                core.points().to_vec(),
                core.total_distance(),
                core.finalize_progress(),
            )
        };

        let session_id = match progress.session_id {
            Some(session_id) => session_id,
            None => {
                let created = self.store.create_session(start_time).await?;
                self.core
                    .lock()
                    .await
                    .note_session_created(created.session_id);
                created.session_id
            }
        };

        if !progress.points_appended {
            self.store.append_points(session_id, &points).await?;
            self.core.lock().await.note_points_appended();
        }

        let end_time = Utc::now();
        self.store
            .finalize_session(session_id, total_distance, end_time)
            .await?;

        self.core.lock().await.finish_stop();

        Ok(WalkSession::new(
            session_id,
            start_time,
            Some(end_time),
            total_distance,
            points,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use chrono::{DateTime, Utc};
    use walk_tracker_data_management::{StoreError, memory_store::MemoryStore};
    use walk_tracker_lib::{distance::track_distance, location_point::LocationPoint};

    use crate::location_source::ChannelSource;

    use super::*;

    /// Delegates to a MemoryStore but fails `finalize_session` while armed.
    #[derive(Clone)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_finalize: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                fail_finalize: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl SessionStore for FlakyStore {
        async fn create_session(
            &self,
            start_time: DateTime<Utc>,
        ) -> Result<WalkSession, StoreError> {
            self.inner.create_session(start_time).await
        }

        async fn append_points(
            &self,
            session_id: Uuid,
            points: &[LocationPoint],
        ) -> Result<(), StoreError> {
            self.inner.append_points(session_id, points).await
        }

        async fn finalize_session(
            &self,
            session_id: Uuid,
            total_distance: f64,
            end_time: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            if self.fail_finalize.load(Ordering::SeqCst) {
                return Err(StoreError::Storage("injected finalize failure".into()));
            }
            self.inner
                .finalize_session(session_id, total_distance, end_time)
                .await
        }

        async fn fetch_session(
            &self,
            session_id: Uuid,
        ) -> Result<Option<WalkSession>, StoreError> {
            self.inner.fetch_session(session_id).await
        }

        async fn fetch_all_sessions(&self) -> Result<Vec<WalkSession>, StoreError> {
            self.inner.fetch_all_sessions().await
        }

        async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
            self.inner.delete_session(session_id).await
        }

        async fn import_session(&self, gpx_text: &str) -> Result<Option<WalkSession>, StoreError> {
            self.inner.import_session(gpx_text).await
        }
    }

    async fn wait_for_points<S: SessionStore, L: LocationSource>(
        tracker: &WalkTracker<S, L>,
        count: usize,
    ) {
        for _ in 0..200 {
            if tracker.point_count().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {count} buffered points");
    }

    #[tokio::test]
    async fn stop_persists_the_session_and_clears_the_buffer() {
        let store = MemoryStore::new();
        let (source, feed) = ChannelSource::new();
        let mut tracker = WalkTracker::new(store.clone(), source);

        tracker.start().await.unwrap();
        assert_eq!(tracker.tracking_state().await, TrackingState::Active);

        assert!(feed.push(37.33018, -122.023907));
        assert!(feed.push(37.33028, -122.023907));
        wait_for_points(&tracker, 2).await;
        assert!(tracker.total_distance().await > 10.0);

        let session = tracker.stop().await.unwrap();
        assert!(session.is_finalized());
        assert_eq!(session.points.len(), 2);

        assert_eq!(tracker.tracking_state().await, TrackingState::Stopped);
        assert_eq!(tracker.point_count().await, 0);
        assert_eq!(tracker.total_distance().await, 0.0);

        let stored = store.fetch_session(session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.points.len(), 2);
        assert_eq!(stored.end_time, session.end_time);
    }

    #[tokio::test]
    async fn pause_stops_delivery_and_resume_restores_it() {
        let store = MemoryStore::new();
        let (source, feed) = ChannelSource::new();
        let mut tracker = WalkTracker::new(store, source);

        tracker.start().await.unwrap();
        assert!(feed.push(37.33018, -122.023907));
        wait_for_points(&tracker, 1).await;

        tracker.pause().await.unwrap();
        assert_eq!(tracker.tracking_state().await, TrackingState::Paused);
        assert!(!feed.push(37.33028, -122.023907));
        assert_eq!(tracker.point_count().await, 1);

        tracker.resume().await.unwrap();
        assert!(feed.push(37.33028, -122.023907));
        wait_for_points(&tracker, 2).await;
    }

    #[tokio::test]
    async fn failed_finalize_retains_the_buffer_and_retry_succeeds() {
        let memory = MemoryStore::new();
        let store = FlakyStore::new(memory.clone());
        let (source, feed) = ChannelSource::new();
        let mut tracker = WalkTracker::new(store.clone(), source);

        tracker.start().await.unwrap();
        assert!(feed.push(37.33018, -122.023907));
        assert!(feed.push(37.33028, -122.023907));
        wait_for_points(&tracker, 2).await;

        store.fail_finalize.store(true, Ordering::SeqCst);
        let failed = tracker.stop().await;
        assert!(matches!(failed, Err(TrackerError::Store(_))));

        // Buffer survives the failed attempt; the machine reports paused.
        assert_eq!(tracker.point_count().await, 2);
        assert_eq!(tracker.tracking_state().await, TrackingState::Paused);

        store.fail_finalize.store(false, Ordering::SeqCst);
        let session = tracker.stop().await.unwrap();

        assert_eq!(tracker.tracking_state().await, TrackingState::Stopped);
        assert_eq!(tracker.point_count().await, 0);

        // The retry resumed the pending finalize: one session, points intact.
        let sessions = memory.fetch_all_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, session.session_id);
        assert_eq!(sessions[0].points.len(), 2);
        assert!(sessions[0].is_finalized());
    }

    #[tokio::test]
    async fn resume_is_rejected_until_a_pending_finalize_completes() {
        let memory = MemoryStore::new();
        let store = FlakyStore::new(memory.clone());
        let (source, feed) = ChannelSource::new();
        let mut tracker = WalkTracker::new(store.clone(), source);

        tracker.start().await.unwrap();
        assert!(feed.push(37.33018, -122.023907));
        assert!(feed.push(37.33028, -122.023907));
        wait_for_points(&tracker, 2).await;

        store.fail_finalize.store(true, Ordering::SeqCst);
        assert!(tracker.stop().await.is_err());

        // The append step already committed; reopening the walk now would
        // record points the retried stop never persists.
        assert!(matches!(
            tracker.resume().await,
            Err(TrackerError::FinalizePending)
        ));
        assert!(!feed.push(37.33038, -122.023907));

        store.fail_finalize.store(false, Ordering::SeqCst);
        let session = tracker.stop().await.unwrap();

        let stored = memory.fetch_session(session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.points.len(), 2);
        assert!((stored.total_distance - track_distance(&stored.points)).abs() < 1e-9);

        // The machine is usable again after the finalize completed.
        tracker.start().await.unwrap();
        assert_eq!(tracker.tracking_state().await, TrackingState::Active);
    }

    #[tokio::test]
    async fn stop_while_stopped_is_an_invalid_transition() {
        let (source, _feed) = ChannelSource::new();
        let mut tracker = WalkTracker::new(MemoryStore::new(), source);

        assert!(matches!(
            tracker.stop().await,
            Err(TrackerError::InvalidTransition { .. })
        ));
        assert!(matches!(
            tracker.pause().await,
            Err(TrackerError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn export_and_import_go_through_the_store() {
        let store = MemoryStore::new();
        let (source, feed) = ChannelSource::new();
        let mut tracker = WalkTracker::new(store, source);

        tracker.start().await.unwrap();
        assert!(feed.push(37.33018, -122.023907));
        assert!(feed.push(37.33048, -122.023907));
        wait_for_points(&tracker, 2).await;
        let session = tracker.stop().await.unwrap();

        let text = tracker
            .export_session(session.session_id, 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(text.matches("<wpt").count(), 2);

        let imported = tracker.import_session(&text).await.unwrap().unwrap();
        assert_eq!(imported.points.len(), 2);

        let sessions = tracker.sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);

        assert!(
            tracker
                .export_session(Uuid::new_v4(), 0.0)
                .await
                .unwrap()
                .is_none()
        );
    }
}
