use walk_tracker_data_management::StoreError;

pub mod location_source;
pub mod state;
pub mod tracker;

pub use state::TrackingState;
pub use tracker::WalkTracker;

#[derive(Debug)]
pub enum TrackerError {
    InvalidTransition {
        from: TrackingState,
        command: &'static str,
    },
    FinalizePending,
    Store(StoreError),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::InvalidTransition { from, command } => {
                write!(f, "cannot {command} while {from:?}")
            }
            TrackerError::FinalizePending => {
                write!(f, "a finalize is pending, retry stop to complete the session")
            }
            TrackerError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        TrackerError::Store(err)
    }
}
