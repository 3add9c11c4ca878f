//! Background timer that keeps the last pose alive downstream.
//!
//! Transform consumers expire samples after a while; when no frames arrive
//! the last known pose is rebroadcast. The thread only fires ticks; the
//! staleness check happens under the odometer lock.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, bounded, select, tick};
use tracing::{debug, warn};

/// Time source for idle republish stamps.
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds, on the same timeline as frame stamps.
    fn now_ns(&self) -> u64;
}

/// Wall clock, nanoseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Handle to the republish thread. Stops and joins on drop.
pub struct IdleRepublisher {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl IdleRepublisher {
    /// Spawn a thread calling `on_tick(clock.now_ns())` every `interval`.
    pub fn spawn<T>(interval: Duration, clock: Arc<dyn Clock>, mut on_tick: T) -> Result<Self>
    where
        T: FnMut(u64) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("idle-republish".to_string())
            .spawn(move || {
                debug!("Idle republisher started ({:?} period)", interval);
                loop {
                    select! {
                        recv(ticker) -> _ => on_tick(clock.now_ns()),
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                debug!("Idle republisher stopped");
            })
            .context("Failed to spawn idle republisher thread")?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn shutdown(&mut self) {
        // Disconnecting the channel wakes the select.
        self.shutdown_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Idle republisher thread panicked");
            }
        }
    }
}

impl Drop for IdleRepublisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
