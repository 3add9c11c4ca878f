//! Frame processor capability: the external motion estimator.
//!
//! A processor keeps its own reference frame between calls and reports, per
//! frame, the camera pose relative to where the camera was when the
//! processor was created, the frame-to-frame motion, and a covariance. The
//! integrator owns at most one processor at a time through a
//! [`ProcessorSlot`] and recreates it through a [`ProcessorFactory`].

use std::fmt;

use anyhow::{Result, bail};
use nalgebra::Matrix6;

use crate::geometry::SE3;
use crate::io::image::{DepthSource, GrayImage};
use crate::odometry::options::VoOptions;

/// Outcome of motion estimation for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionStatus {
    /// No reference frame yet (first frame after creation).
    NoData,
    Success,
    InsufficientInliers,
    OptimizationFailure,
    ReprojectionError,
}

impl MotionStatus {
    pub const ALL: [MotionStatus; 5] = [
        MotionStatus::NoData,
        MotionStatus::Success,
        MotionStatus::InsufficientInliers,
        MotionStatus::OptimizationFailure,
        MotionStatus::ReprojectionError,
    ];

    /// Numeric code as reported on the diagnostics record.
    pub fn code(self) -> u8 {
        match self {
            MotionStatus::NoData => 0,
            MotionStatus::Success => 1,
            MotionStatus::InsufficientInliers => 2,
            MotionStatus::OptimizationFailure => 3,
            MotionStatus::ReprojectionError => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MotionStatus::NoData => "NO_DATA",
            MotionStatus::Success => "SUCCESS",
            MotionStatus::InsufficientInliers => "INSUFFICIENT_INLIERS",
            MotionStatus::OptimizationFailure => "OPTIMIZATION_FAILURE",
            MotionStatus::ReprojectionError => "REPROJECTION_ERROR",
        }
    }

    /// Parse either the status string or its numeric code.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }

    pub fn is_success(self) -> bool {
        self == MotionStatus::Success
    }
}

impl fmt::Display for MotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keypoint counts for one image pyramid level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub num_detected_keypoints: usize,
    pub num_keypoints: usize,
}

/// Feature bookkeeping reported by the processor for the target frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureStats {
    pub levels: Vec<LevelStats>,
    pub num_matches: usize,
    pub num_inliers: usize,
    pub num_reprojection_failures: usize,
    /// Whether the processor switched its reference frame on this call.
    pub change_reference_frame: bool,
    pub fast_threshold: i32,
}

impl FeatureStats {
    pub fn num_detected_keypoints(&self) -> usize {
        self.levels.iter().map(|l| l.num_detected_keypoints).sum()
    }

    pub fn num_keypoints(&self) -> usize {
        self.levels.iter().map(|l| l.num_keypoints).sum()
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone)]
pub struct MotionEstimate {
    pub status: MotionStatus,
    /// Camera pose relative to the camera pose at processor creation
    /// (`T_s0_s`).
    pub relative_pose: SE3,
    /// Camera motion from the previous frame to this one.
    pub frame_motion: SE3,
    /// Covariance of `frame_motion`, ordered (x, y, z, roll, pitch, yaw).
    pub covariance: Matrix6<f64>,
    pub stats: FeatureStats,
}

impl MotionEstimate {
    /// Estimate carrying only a status (no motion).
    pub fn without_motion(status: MotionStatus) -> Self {
        Self {
            status,
            relative_pose: SE3::identity(),
            frame_motion: SE3::identity(),
            covariance: Matrix6::zeros(),
            stats: FeatureStats::default(),
        }
    }
}

/// External motion estimator.
pub trait FrameProcessor: Send {
    /// Feed the next frame and return the resulting estimate.
    fn process_frame(
        &mut self,
        image: &GrayImage<'_>,
        depth: &dyn DepthSource,
    ) -> Result<MotionEstimate>;
}

/// Creates processors on demand with a given option set.
pub trait ProcessorFactory: Send {
    type Processor: FrameProcessor;

    /// The processor's full default option set, keyed in its own
    /// (hyphenated) naming.
    fn default_options(&self) -> VoOptions;

    fn create(&mut self, options: &VoOptions) -> Result<Self::Processor>;
}

/// Ownership slot for the live processor.
#[derive(Debug)]
pub enum ProcessorSlot<P> {
    Absent,
    Active(P),
}

impl<P> Default for ProcessorSlot<P> {
    fn default() -> Self {
        ProcessorSlot::Absent
    }
}

impl<P> ProcessorSlot<P> {
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessorSlot::Active(_))
    }

    /// Drop the processor, if any. Returns whether one was live.
    pub fn reset(&mut self) -> bool {
        matches!(std::mem::take(self), ProcessorSlot::Active(_))
    }

    /// Create a processor if absent. Returns the processor and whether it
    /// was created by this call.
    pub fn get_or_try_insert_with(
        &mut self,
        create: impl FnOnce() -> Result<P>,
    ) -> Result<(&mut P, bool)> {
        let created = !self.is_active();
        if created {
            *self = ProcessorSlot::Active(create()?);
        }
        let ProcessorSlot::Active(p) = self else {
            bail!("processor slot empty after creation");
        };
        Ok((p, created))
    }
}
