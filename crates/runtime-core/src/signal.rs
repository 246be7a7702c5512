//! External stop signal
//!
//! A stop request is honoured by the scheduler at its next boundary-check
//! point; a batch in flight always completes.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Sender side of the stop signal, cheap to clone
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

/// Receiver side of the stop signal, polled by the scheduler
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Create a connected signal/listener pair
    pub fn new() -> (Self, StopListener) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, StopListener { rx })
    }

    /// Request a stop
    pub fn request_stop(&self) {
        if !*self.tx.borrow() {
            info!("Stop requested");
        }
        self.tx.send_replace(true);
    }

    /// Subscribe another listener
    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopListener {
    /// True once a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        *self.rx.borrow()
    }
}
