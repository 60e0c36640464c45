use crate::error::Result;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Cancellation token shared between the signal handler and the scan loop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    cancelled: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled on Ctrl-C. Only one handler can be
    /// installed per process.
    pub fn on_ctrl_c() -> Result<Self> {
        let shutdown = Shutdown::new();
        let s = shutdown.clone();
        ctrlc::set_handler(move || s.cancel())?;
        Ok(shutdown)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
