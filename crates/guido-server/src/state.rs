use guido::agent::Agent;
use guido::mode::Mode;
use guido::transcript::Transcript;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The conversation served by this process
pub struct Session {
    pub transcript: Transcript,
    pub mode: Mode,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(agent: Agent) -> anyhow::Result<Self> {
        let mode = Mode::default();
        Ok(Self {
            agent: Arc::new(agent),
            session: Arc::new(Mutex::new(Session {
                transcript: Transcript::with_mode(mode)?,
                mode,
            })),
        })
    }
}
