//! Output records handed to the publisher sink.
//!
//! These mirror what a transport layer emits: a stamped pose, an odometry
//! record with twist and covariance, a world → base transform, and a
//! per-frame diagnostics record.

use nalgebra::Vector3;

use crate::geometry::SE3;
use crate::odometry::{FrameDiagnostic, Twist};

/// Stamp and frame of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub stamp_ns: u64,
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp_ns: u64, frame_id: &str) -> Self {
        Self {
            stamp_ns,
            frame_id: frame_id.to_string(),
        }
    }
}

/// Base pose in the world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: SE3,
}

/// Velocity part of an odometry record.
#[derive(Debug, Clone, PartialEq)]
pub struct TwistWithCovariance {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
    /// Row-major 6x6, (linear xyz, angular xyz).
    pub covariance: [f64; 36],
}

impl From<&Twist> for TwistWithCovariance {
    fn from(twist: &Twist) -> Self {
        let mut covariance = [0.0; 36];
        for row in 0..6 {
            for col in 0..6 {
                covariance[row * 6 + col] = twist.covariance[(row, col)];
            }
        }
        Self {
            linear: twist.linear,
            angular: twist.angular,
            covariance,
        }
    }
}

/// Pose of `child_frame_id` in `header.frame_id`, with optional twist.
#[derive(Debug, Clone, PartialEq)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: SE3,
    /// Absent when no valid previous sample existed.
    pub twist: Option<TwistWithCovariance>,
}

/// World → base transform broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: SE3,
}

/// Per-frame diagnostics record.
#[derive(Debug, Clone, PartialEq)]
pub struct OdometryInfo {
    pub header: Header,
    pub change_reference_frame: bool,
    pub fast_threshold: i32,
    pub num_total_detected_keypoints: usize,
    pub num_total_keypoints: usize,
    pub num_detected_keypoints: Vec<usize>,
    pub num_keypoints: Vec<usize>,
    pub motion_estimate_status_code: u8,
    pub motion_estimate_status: String,
    pub num_matches: usize,
    pub num_inliers: usize,
    pub num_reprojection_failures: usize,
    pub motion_estimate_valid: bool,
    /// Processing time, seconds.
    pub runtime: f64,
}

impl OdometryInfo {
    pub fn from_diagnostic(diagnostic: &FrameDiagnostic, frame_id: &str) -> Self {
        let stats = &diagnostic.stats;
        Self {
            header: Header::new(diagnostic.stamp_ns, frame_id),
            change_reference_frame: stats.change_reference_frame,
            fast_threshold: stats.fast_threshold,
            num_total_detected_keypoints: stats.num_detected_keypoints(),
            num_total_keypoints: stats.num_keypoints(),
            num_detected_keypoints: stats
                .levels
                .iter()
                .map(|l| l.num_detected_keypoints)
                .collect(),
            num_keypoints: stats.levels.iter().map(|l| l.num_keypoints).collect(),
            motion_estimate_status_code: diagnostic.status_code(),
            motion_estimate_status: diagnostic.status_str().to_string(),
            num_matches: stats.num_matches,
            num_inliers: stats.num_inliers,
            num_reprojection_failures: stats.num_reprojection_failures,
            motion_estimate_valid: diagnostic.motion_estimate_valid(),
            runtime: diagnostic.runtime_s,
        }
    }
}

/// Any record the odometer emits, for channel-based sinks.
#[derive(Debug, Clone, PartialEq)]
pub enum OdometryMessage {
    Odometry(Odometry),
    Pose(PoseStamped),
    Transform(TransformStamped),
    Info(OdometryInfo),
}
