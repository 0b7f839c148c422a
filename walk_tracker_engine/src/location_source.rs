use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// One raw GPS fix from the platform location service. The engine stamps its
/// own receipt time when the sample is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
}

/// A start/stop-controllable push stream of GPS fixes.
pub trait LocationSource: Send {
    /// Begins delivery and returns the channel samples arrive on. Called on
    /// every start/resume; any previous receiver is superseded.
    fn start_updates(&mut self) -> mpsc::Receiver<GeoSample>;

    /// Stops delivery. Buffered but undelivered samples are discarded.
    fn stop_updates(&mut self);
}

/// Channel-backed source: the tracker consumes one end, the platform side
/// pushes through a [`SampleFeed`]. Pushes between stop and the next start
/// go nowhere, which is exactly the pause semantics the engine wants.
pub struct ChannelSource {
    slot: Arc<Mutex<Option<mpsc::Sender<GeoSample>>>>,
}

#[derive(Clone)]
pub struct SampleFeed {
    slot: Arc<Mutex<Option<mpsc::Sender<GeoSample>>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, SampleFeed) {
        let slot = Arc::new(Mutex::new(None));
        (Self { slot: slot.clone() }, SampleFeed { slot })
    }
}

impl LocationSource for ChannelSource {
    fn start_updates(&mut self) -> mpsc::Receiver<GeoSample> {
        let (tx, rx) = mpsc::channel(64);
        *self.slot.lock().unwrap() = Some(tx);
        rx
    }

    fn stop_updates(&mut self) {
        self.slot.lock().unwrap().take();
    }
}

impl SampleFeed {
    /// Pushes a fix to the tracker. Returns false when updates are stopped or
    /// the receiver is gone, so callers can tell the sample was dropped.
    pub fn push(&self, latitude: f64, longitude: f64) -> bool {
        match &*self.slot.lock().unwrap() {
            Some(tx) => tx
                .try_send(GeoSample {
                    latitude,
                    longitude,
                })
                .is_ok(),
            None => false,
        }
    }
}
