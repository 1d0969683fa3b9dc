//! Background worker that flushes a shared registry on a fixed cadence.
//!
//! Hosts start one [`PeriodicFlush`] next to the registry, usually with
//! [`crate::config::WardenSettings::flush_interval`], and stop it before the
//! final [`PunishmentRegistry::close`].

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::PunishmentRegistry;
use super::ports::PunishmentProvider;

/// Handle to a thread that calls [`PunishmentRegistry::save`] every
/// `interval`.
///
/// A failed flush is logged and the worker keeps going; holders that failed
/// are retried on the next tick. Dropping the handle stops the worker
/// without waiting for it.
#[derive(Debug)]
pub struct PeriodicFlush {
    stop: Sender<()>,
    worker: JoinHandle<()>,
}

impl PeriodicFlush {
    /// Start flushing `registry` every `interval`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// use mockable::DefaultClock;
    /// use warden::domain::flush::PeriodicFlush;
    /// use warden::domain::ports::FixturePunishmentProvider;
    /// use warden::domain::PunishmentRegistry;
    ///
    /// let registry = Arc::new(PunishmentRegistry::new(
    ///     Arc::new(FixturePunishmentProvider),
    ///     Arc::new(DefaultClock),
    /// ));
    /// let flusher = PeriodicFlush::spawn(Arc::clone(&registry), Duration::from_secs(300));
    ///
    /// flusher.stop();
    /// registry.close().expect("final flush");
    /// ```
    pub fn spawn<P>(registry: Arc<PunishmentRegistry<P>>, interval: Duration) -> Self
    where
        P: PunishmentProvider + 'static,
    {
        let (stop, stop_requested) = mpsc::channel();
        let worker = thread::spawn(move || {
            loop {
                match stop_requested.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(error) = registry.save() {
                            warn!(%error, "periodic punishment flush failed");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("periodic punishment flush stopped");
        });
        debug!(interval_secs = interval.as_secs(), "periodic punishment flush started");
        Self { stop, worker }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// A flush already in progress completes first. No extra flush is
    /// performed; follow with [`PunishmentRegistry::close`] at shutdown.
    pub fn stop(self) {
        // A send error means the worker is already gone; join reports why.
        if self.stop.send(()).is_err() {
            debug!("periodic punishment flush already exited");
        }
        if self.worker.join().is_err() {
            warn!("periodic punishment flush worker panicked");
        }
    }
}
