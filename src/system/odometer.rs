//! Odometer - main entry point and thread orchestration.
//!
//! The `Odometer` owns the locked integrator state and, optionally, the idle
//! republisher thread. Frames are processed in the calling thread.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::info;

use crate::config::OdometerConfig;
use crate::extrinsics::ExtrinsicsResolver;
use crate::geometry::SE3;
use crate::io::image::{DepthSource, GrayImage};
use crate::odometry::{FrameOutput, IntegratorPhase, PoseIntegrator, ProcessorFactory};

use super::republisher::{Clock, IdleRepublisher};
use super::shared_state::{OdometerCore, SharedOdometer};
use super::sink::OdometrySink;

/// Visual odometry front end: integrator + publisher sink behind one lock.
pub struct Odometer<F: ProcessorFactory + 'static> {
    shared: SharedOdometer<F>,
    republisher: Option<IdleRepublisher>,
}

impl<F: ProcessorFactory + 'static> Odometer<F> {
    pub fn new(
        factory: F,
        extrinsics: Box<dyn ExtrinsicsResolver>,
        sink: Box<dyn OdometrySink>,
        config: OdometerConfig,
    ) -> Self {
        let integrator = PoseIntegrator::new(factory, extrinsics, &config);
        info!(
            "Odometer publishing '{}' -> '{}' (tf: {}, translation factor: {})",
            config.odom_frame_id,
            config.base_link_frame_id,
            config.publish_tf,
            integrator.translation_factor()
        );
        Self {
            shared: Arc::new(Mutex::new(OdometerCore::new(integrator, sink, config))),
            republisher: None,
        }
    }

    /// Process a frame and publish the result.
    pub fn process(
        &self,
        image: &GrayImage<'_>,
        depth: &dyn DepthSource,
        stamp_ns: u64,
    ) -> Result<FrameOutput> {
        self.shared.lock().process(image, depth, stamp_ns)
    }

    /// Zero the odometry: the next frame starts a new chain at identity.
    pub fn reinit(&self) {
        self.shared.lock().integrator.reinit();
    }

    /// Idle republish check; see [`OdometerCore::publish_last_known_pose`].
    pub fn publish_last_known_pose(&self, now_ns: u64) -> bool {
        self.shared.lock().publish_last_known_pose(now_ns)
    }

    /// Flush the sink, surfacing any buffered write error.
    pub fn flush(&self) -> Result<()> {
        self.shared.lock().flush()
    }

    pub fn last_known_pose(&self) -> SE3 {
        self.shared.lock().integrator.last_known_pose().clone()
    }

    pub fn phase(&self) -> IntegratorPhase {
        self.shared.lock().integrator.phase()
    }

    /// Start the background idle republisher using the configured period.
    /// Replaces a running one.
    pub fn start_idle_republisher(&mut self, clock: Arc<dyn Clock>) -> Result<()> {
        self.stop_idle_republisher();
        let shared = self.shared.clone();
        let interval = shared.lock().config.republish_interval();
        let republisher = IdleRepublisher::spawn(interval, clock, move |now_ns| {
            shared.lock().publish_last_known_pose(now_ns);
        })?;
        self.republisher = Some(republisher);
        Ok(())
    }

    pub fn stop_idle_republisher(&mut self) {
        if let Some(mut republisher) = self.republisher.take() {
            republisher.shutdown();
        }
    }

    /// Stop background work. Also done on drop.
    pub fn shutdown(&mut self) {
        self.stop_idle_republisher();
    }
}

impl<F: ProcessorFactory + 'static> Drop for Odometer<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
