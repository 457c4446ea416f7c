//! Background thread driving periodic update checks.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::sync::{SyncEngine, UpdateOutcome};
use crate::Result;

/// Default time between update checks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Calls [`SyncEngine::update_blocked_domains`] on a fixed tick.
///
/// The first check happens one tick after start; call
/// [`SyncEngine::init`] for the start-up update. Stops and joins on drop.
pub struct SyncScheduler {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn the scheduler thread.
    pub fn start(engine: Arc<SyncEngine>, tick: Duration) -> Result<Self> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);

        log::info!("Starting sync scheduler (tick: {:?})", tick);
        let handle = thread::Builder::new()
            .name("holeguard-sync".to_string())
            .spawn(move || {
                let (lock, cvar) = &*signal;
                loop {
                    {
                        let mut stopped = lock.lock();
                        if !*stopped {
                            cvar.wait_for(&mut stopped, tick);
                        }
                        if *stopped {
                            break;
                        }
                    }
                    match engine.update_blocked_domains() {
                        UpdateOutcome::NotDue => {}
                        UpdateOutcome::Failed(e) => log::warn!("Scheduled update failed: {}", e),
                        outcome => log::debug!("Scheduled update: {:?}", outcome),
                    }
                }
                log::debug!("Sync scheduler stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it, including any update in progress.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock() = true;
        cvar.notify_all();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Sync scheduler thread panicked");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
