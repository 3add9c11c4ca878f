//! Pose integrator: turns per-frame motion estimates into a world pose.
//!
//! The integrator owns the frame processor, the anchor (where the
//! processor's origin sits in the world) and the last good pose. Each
//! successful frame composes
//!
//! ```text
//! T_world_base = anchor * T_s0_s * T_base_sensor^-1
//! ```
//!
//! If that pose comes out non-finite, the processor is dropped and the
//! anchor is moved to the last good pose, so the next processor continues
//! the published trajectory instead of restarting at the origin.

use std::time::{Duration, Instant};

use anyhow::{Result, bail, ensure};
use tracing::{error, info, warn};

use crate::config::{IDLE_REPUBLISH_THRESHOLD, OdometerConfig};
use crate::extrinsics::{ExtrinsicsResolver, WarnThrottle, resolve_or_identity};
use crate::geometry::{SE3, SensorMount};
use crate::io::image::{DepthSource, GrayImage};
use crate::odometry::options::VoOptions;
use crate::odometry::processor::{FrameProcessor, MotionEstimate, ProcessorFactory, ProcessorSlot};
use crate::odometry::result::{FrameDiagnostic, FrameOutcome, FrameOutput};
use crate::odometry::state::{AnchorMode, IntegratorPhase};
use crate::odometry::velocity::{Twist, VelocityEstimator};

/// Pose integration and drift-recovery state machine.
pub struct PoseIntegrator<F: ProcessorFactory> {
    factory: F,
    options: VoOptions,
    processor: ProcessorSlot<F::Processor>,

    extrinsics: Box<dyn ExtrinsicsResolver>,
    extrinsics_warn: WarnThrottle,
    base_frame_id: String,

    /// Scale applied to the translation of every composed pose (never 0).
    translation_factor: f64,

    /// World pose of the processor's origin (`T_world_s0`).
    anchor: SE3,
    /// Pending anchor choice for the next processor creation.
    anchor_mode: AnchorMode,

    /// Last good base pose (`T_world_base`). Never non-finite.
    pose: SE3,
    velocity: VelocityEstimator,

    /// Stamp of the last pose broadcast (frame or idle republish).
    last_published_ns: u64,
}

impl<F: ProcessorFactory> PoseIntegrator<F> {
    pub fn new(factory: F, extrinsics: Box<dyn ExtrinsicsResolver>, config: &OdometerConfig) -> Self {
        let mut options = factory.default_options();
        options.apply_overrides(&config.vo_options);

        Self {
            factory,
            options,
            processor: ProcessorSlot::Absent,
            extrinsics,
            extrinsics_warn: WarnThrottle::default(),
            base_frame_id: config.base_link_frame_id.clone(),
            translation_factor: config.effective_tf_factor(),
            anchor: SE3::identity(),
            anchor_mode: AnchorMode::ColdStart,
            pose: SE3::identity(),
            velocity: VelocityEstimator::new(),
            last_published_ns: 0,
        }
    }

    pub fn phase(&self) -> IntegratorPhase {
        if self.processor.is_active() {
            IntegratorPhase::Tracking
        } else {
            IntegratorPhase::Uninitialized
        }
    }

    pub fn anchor(&self) -> &SE3 {
        &self.anchor
    }

    pub fn anchor_mode(&self) -> AnchorMode {
        self.anchor_mode
    }

    /// Last good base pose in the world.
    pub fn last_known_pose(&self) -> &SE3 {
        &self.pose
    }

    pub fn last_estimate_stamp_ns(&self) -> Option<u64> {
        self.velocity.last_stamp_ns()
    }

    pub fn last_published_ns(&self) -> u64 {
        self.last_published_ns
    }

    pub fn options(&self) -> &VoOptions {
        &self.options
    }

    pub fn translation_factor(&self) -> f64 {
        self.translation_factor
    }

    /// Process one camera frame.
    ///
    /// Errors are reserved for caller contract violations (malformed image,
    /// no depth data) and processor failures; sensor-quality problems are
    /// reported in the returned diagnostic.
    pub fn process_frame(
        &mut self,
        image: &GrayImage<'_>,
        depth: &dyn DepthSource,
        stamp_ns: u64,
    ) -> Result<FrameOutput> {
        let t_start = Instant::now();

        image.validate()?;
        ensure!(
            depth.has_data(),
            "no depth data attached for frame at {} ns",
            stamp_ns
        );

        let first_run = !self.processor.is_active();
        if first_run {
            self.start_tracking(image.frame_id, stamp_ns)?;
        }

        let ProcessorSlot::Active(processor) = &mut self.processor else {
            bail!("frame processor missing after initialization");
        };
        let estimate = processor.process_frame(image, depth)?;

        // No reference frame yet: nothing to measure against.
        if first_run {
            self.velocity.invalidate();
            return Ok(Self::output(None, None, FrameOutcome::Initialized, estimate, stamp_ns, t_start));
        }

        if !estimate.status.is_success() {
            warn!("Odometry failed: {}", estimate.status);
            self.velocity.invalidate();
            return Ok(Self::output(
                None,
                None,
                FrameOutcome::EstimationFailed,
                estimate,
                stamp_ns,
                t_start,
            ));
        }

        let (t_base_sensor, _) = resolve_or_identity(
            self.extrinsics.as_ref(),
            &mut self.extrinsics_warn,
            &self.base_frame_id,
            image.frame_id,
            stamp_ns,
        );
        let mount = SensorMount::new(t_base_sensor);

        let world_pose = mount.base_pose_in_world(&self.anchor, &estimate.relative_pose);
        if !world_pose.is_finite() {
            error!("Non-finite value in odometry pose, resetting odometer");
            // Resume from the last good pose, not from the faulty one.
            self.anchor = mount.anchor_at(&self.pose);
            self.anchor_mode = AnchorMode::Resume;
            self.processor.reset();
            self.velocity.invalidate();
            return Ok(Self::output(None, None, FrameOutcome::Reanchored, estimate, stamp_ns, t_start));
        }

        self.pose = world_pose.with_scaled_translation(self.translation_factor);
        self.last_published_ns = stamp_ns;

        let twist = self.velocity.update(
            stamp_ns,
            &mount,
            &estimate.frame_motion,
            &estimate.covariance,
        );

        let pose = self.pose.clone();
        Ok(Self::output(Some(pose), twist, FrameOutcome::Updated, estimate, stamp_ns, t_start))
    }

    /// Drop the processor so the next frame starts again from identity.
    ///
    /// Unlike the fault path this discards any pending resume anchor.
    pub fn reinit(&mut self) {
        if self.processor.reset() {
            info!("Reinitializing odometry");
        }
        self.anchor_mode = AnchorMode::ColdStart;
    }

    /// Pose to rebroadcast if nothing was published for longer than the
    /// idle threshold. Marks it as published at `now_ns`.
    pub fn take_idle_republish(&mut self, now_ns: u64) -> Option<SE3> {
        self.take_idle_republish_after(now_ns, IDLE_REPUBLISH_THRESHOLD)
    }

    pub fn take_idle_republish_after(&mut self, now_ns: u64, threshold: Duration) -> Option<SE3> {
        let idle = Duration::from_nanos(now_ns.saturating_sub(self.last_published_ns));
        if idle <= threshold {
            return None;
        }
        self.last_published_ns = now_ns;
        Some(self.pose.clone())
    }

    /// Create the processor and fix the anchor for the new pose chain.
    fn start_tracking(&mut self, sensor_frame_id: &str, stamp_ns: u64) -> Result<()> {
        let factory = &mut self.factory;
        let options = &self.options;
        self.processor
            .get_or_try_insert_with(|| factory.create(options))?;

        match self.anchor_mode {
            AnchorMode::ColdStart => {
                let (t_base_sensor, _) = resolve_or_identity(
                    self.extrinsics.as_ref(),
                    &mut self.extrinsics_warn,
                    &self.base_frame_id,
                    sensor_frame_id,
                    stamp_ns,
                );
                self.anchor = t_base_sensor;
            }
            AnchorMode::Resume => self.anchor_mode = AnchorMode::ColdStart,
        }

        info!(
            "Initialized odometry with the following options:\n{}",
            self.options
        );
        Ok(())
    }

    fn output(
        pose: Option<SE3>,
        twist: Option<Twist>,
        outcome: FrameOutcome,
        estimate: MotionEstimate,
        stamp_ns: u64,
        t_start: Instant,
    ) -> FrameOutput {
        FrameOutput {
            pose,
            twist,
            diagnostic: FrameDiagnostic {
                stamp_ns,
                outcome,
                status: estimate.status,
                stats: estimate.stats,
                runtime_s: t_start.elapsed().as_secs_f64(),
            },
        }
    }
}
