//! State shared between the frame thread and the idle republisher.
//!
//! Everything lives behind one mutex: frame processing and idle republish
//! never interleave.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::OdometerConfig;
use crate::geometry::SE3;
use crate::io::image::{DepthSource, GrayImage};
use crate::odometry::{FrameOutcome, FrameOutput, PoseIntegrator, ProcessorFactory};

use super::messages::{Header, Odometry, OdometryInfo, PoseStamped, TransformStamped};
use super::sink::OdometrySink;

/// Handle to the locked odometer state.
pub type SharedOdometer<F> = Arc<Mutex<OdometerCore<F>>>;

/// Integrator plus where its output goes.
pub struct OdometerCore<F: ProcessorFactory> {
    pub integrator: PoseIntegrator<F>,
    pub sink: Box<dyn OdometrySink>,
    pub config: OdometerConfig,
}

impl<F: ProcessorFactory> OdometerCore<F> {
    pub fn new(integrator: PoseIntegrator<F>, sink: Box<dyn OdometrySink>, config: OdometerConfig) -> Self {
        Self {
            integrator,
            sink,
            config,
        }
    }

    /// Run one frame through the integrator and publish the result.
    pub fn process(
        &mut self,
        image: &GrayImage<'_>,
        depth: &dyn DepthSource,
        stamp_ns: u64,
    ) -> Result<FrameOutput> {
        let output = self.integrator.process_frame(image, depth, stamp_ns)?;

        if let Some(pose) = &output.pose {
            if self.config.publish_tf {
                self.broadcast(pose, stamp_ns);
            }

            self.sink.publish_odometry(&Odometry {
                header: Header::new(stamp_ns, &self.config.odom_frame_id),
                child_frame_id: self.config.base_link_frame_id.clone(),
                pose: pose.clone(),
                twist: output.twist.as_ref().map(Into::into),
            });
            self.sink.publish_pose(&PoseStamped {
                header: Header::new(stamp_ns, &self.config.odom_frame_id),
                pose: pose.clone(),
            });
        }

        // A re-anchored frame reports nothing but the error log.
        if output.diagnostic.outcome != FrameOutcome::Reanchored {
            self.sink
                .publish_info(&OdometryInfo::from_diagnostic(&output.diagnostic, image.frame_id));
        }
        Ok(output)
    }

    /// Rebroadcast the last known pose if broadcasting is on and nothing
    /// went out recently. Returns whether a transform was sent.
    pub fn publish_last_known_pose(&mut self, now_ns: u64) -> bool {
        if !self.config.publish_tf {
            return false;
        }
        match self.integrator.take_idle_republish(now_ns) {
            Some(pose) => {
                debug!("Republishing last known pose at {} ns", now_ns);
                self.broadcast(&pose, now_ns);
                true
            }
            None => false,
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    fn broadcast(&mut self, pose: &SE3, stamp_ns: u64) {
        self.sink.publish_transform(&TransformStamped {
            header: Header::new(stamp_ns, &self.config.odom_frame_id),
            child_frame_id: self.config.base_link_frame_id.clone(),
            transform: pose.clone(),
        });
    }
}
