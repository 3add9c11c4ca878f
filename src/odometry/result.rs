//! Per-frame integrator output and diagnostics.
//!
//! A frame always yields a diagnostic. The pose and twist are present only
//! when the frame produced a valid update; "no pose this cycle" is a normal
//! outcome.

use crate::geometry::SE3;
use crate::odometry::processor::{FeatureStats, MotionStatus};
use crate::odometry::velocity::Twist;

/// What happened to the pose chain on this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Processor (re)created; no reference frame to measure against yet.
    Initialized,
    /// Pose updated.
    Updated,
    /// Motion estimation did not succeed; pose untouched.
    EstimationFailed,
    /// Composed pose had non-finite components; pose chain re-anchored.
    Reanchored,
}

/// Observational record of one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDiagnostic {
    pub stamp_ns: u64,
    pub outcome: FrameOutcome,
    pub status: MotionStatus,
    pub stats: FeatureStats,
    /// Wall-clock time spent in `process_frame`, seconds.
    pub runtime_s: f64,
}

impl FrameDiagnostic {
    pub fn status_code(&self) -> u8 {
        self.status.code()
    }

    pub fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    /// False for a rejected pose even when the processor reported success.
    pub fn motion_estimate_valid(&self) -> bool {
        self.status.is_success() && self.outcome != FrameOutcome::Reanchored
    }
}

/// Output of `PoseIntegrator::process_frame`.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Base pose in the world (`T_world_base`), stamped at the frame time.
    pub pose: Option<SE3>,
    /// Present only when a valid previous sample existed.
    pub twist: Option<Twist>,
    pub diagnostic: FrameDiagnostic,
}
