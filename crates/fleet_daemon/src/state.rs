use fleet_core::EventEnvelope;
use fleet_world::Session;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::broadcast;

pub type SharedSession = Arc<Mutex<Session>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
    pub event_tx: EventTx,
    pub ticks_per_sec: f64,
    pub paused: Arc<AtomicBool>,
    /// Where `/api/v1/save` writes. `None` disables saving.
    pub state_path: Option<Arc<PathBuf>>,
}
