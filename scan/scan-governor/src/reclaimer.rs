//! Background reclamation thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::debug;

use crate::ResourceGovernor;

/// Handle to a running reclaimer. Dropping it stops the thread.
#[derive(Debug)]
pub struct ReclaimerHandle {
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReclaimerHandle {
    /// Stops the reclaimer and waits for it to exit. Idempotent.
    pub fn stop(&mut self) {
        // Disconnecting the channel wakes the thread immediately.
        self.stop_tx = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Returns true until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for ReclaimerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ResourceGovernor {
    /// Runs [`reclaim`](Self::reclaim) every `interval` on a background thread.
    pub fn spawn_reclaimer(&self, interval: Duration) -> ReclaimerHandle {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let governor = self.clone();

        let handle = thread::spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "reclaimer started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        governor.reclaim();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("reclaimer stopped");
        });

        ReclaimerHandle {
            stop_tx: Some(stop_tx),
            thread_handle: Some(handle),
        }
    }
}
