use chrono::{DateTime, Utc};
use geo_types::Point;
use uuid::Uuid;
use walk_tracker_lib::{distance::distance, location_point::LocationPoint};

use crate::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Stopped,
    Active,
    Paused,
}

/// Which finalize steps have already succeeded, so a retried stop resumes
/// where the previous attempt failed instead of duplicating the session row.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FinalizeProgress {
    pub session_id: Option<Uuid>,
    pub points_appended: bool,
}

/// The transition core of the tracking state machine. Holds the live point
/// buffer and running total; free of I/O, every mutation takes an explicit
/// `now` so transitions are testable without a clock or a runtime.
pub struct TrackerCore {
    tracking: TrackingState,
    points: Vec<LocationPoint>,
    total_distance: f64,
    started_at: Option<DateTime<Utc>>,
    finalize: FinalizeProgress,
}

impl TrackerCore {
    pub fn new() -> Self {
        Self {
            tracking: TrackingState::Stopped,
            points: Vec::new(),
            total_distance: 0.0,
            started_at: None,
            finalize: FinalizeProgress::default(),
        }
    }

    pub fn tracking(&self) -> TrackingState {
        self.tracking
    }

    pub fn points(&self) -> &[LocationPoint] {
        &self.points
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// `Stopped -> Active`: fresh buffer, zero distance, start time = now.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TrackerError> {
        self.require(TrackingState::Stopped, "start")?;

        self.points.clear();
        self.total_distance = 0.0;
        self.started_at = Some(now);
        self.finalize = FinalizeProgress::default();
        self.tracking = TrackingState::Active;

        Ok(())
    }

    /// `Active -> Paused`: buffer and accumulated distance stay untouched.
    pub fn pause(&mut self) -> Result<(), TrackerError> {
        self.require(TrackingState::Active, "pause")?;
        self.tracking = TrackingState::Paused;

        Ok(())
    }

    /// `Paused -> Active`: no reset. Rejected once a stop attempt has begun
    /// persisting: a retried stop skips completed steps, so points recorded
    /// after a resume here would never reach the store.
    pub fn resume(&mut self) -> Result<(), TrackerError> {
        self.require(TrackingState::Paused, "resume")?;
        if self.finalize_pending() {
            return Err(TrackerError::FinalizePending);
        }
        self.tracking = TrackingState::Active;

        Ok(())
    }

    /// True while a partially completed finalize is waiting for a retried
    /// stop. Only `stop` leaves this posture.
    pub fn finalize_pending(&self) -> bool {
        self.finalize.session_id.is_some()
    }

    /// Samples only have an effect while `Active`; anything else is dropped
    /// as ordinary control flow, not an error.
    pub fn record_sample(&mut self, position: Point<f64>, now: DateTime<Utc>) {
        if self.tracking != TrackingState::Active {
            return;
        }

        let point = LocationPoint::new(position, now);
        if let Some(last) = self.points.last() {
            self.total_distance += distance(last, &point);
        }
        self.points.push(point);
    }

    /// First half of `stop`: guards the transition and takes the machine into
    /// the finalize-pending posture. Stream consumption is off and the buffer
    /// is retained until the gateway confirms, so the state reads `Paused`
    /// and a failed finalize can simply be retried.
    pub fn begin_stop(&mut self) -> Result<(), TrackerError> {
        if self.tracking == TrackingState::Stopped {
            return Err(TrackerError::InvalidTransition {
                from: self.tracking,
                command: "stop",
            });
        }
        self.tracking = TrackingState::Paused;

        Ok(())
    }

    /// Second half of `stop`, called only after the gateway confirmed: clears
    /// the buffer and completes the transition to `Stopped`.
    pub fn finish_stop(&mut self) {
        self.points.clear();
        self.total_distance = 0.0;
        self.started_at = None;
        self.finalize = FinalizeProgress::default();
        self.tracking = TrackingState::Stopped;
    }

    pub(crate) fn finalize_progress(&self) -> FinalizeProgress {
        self.finalize
    }

    pub(crate) fn note_session_created(&mut self, session_id: Uuid) {
        self.finalize.session_id = Some(session_id);
    }

    pub(crate) fn note_points_appended(&mut self) {
        self.finalize.points_appended = true;
    }

    fn require(&self, expected: TrackingState, command: &'static str) -> Result<(), TrackerError> {
        if self.tracking != expected {
            return Err(TrackerError::InvalidTransition {
                from: self.tracking,
                command,
            });
        }

        Ok(())
    }
}

impl Default for TrackerCore {
    fn default() -> Self {
        Self::new()
    }
}
