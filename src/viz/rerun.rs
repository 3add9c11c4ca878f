//! Rerun-based visualization of odometer output.
//!
//! Entity hierarchy:
//!     status               - Last motion estimate status and feature counts
//!     world/
//!         base             - Current base pose (transform)
//!         trajectory       - Published positions (gray line)
//!     plots/
//!         inliers          - Inlier count per frame
//!         speed            - Linear speed from the twist estimate

use anyhow::{Context, Result};
use nalgebra::Vector3;
use rerun::{RecordingStream, external::glam};

use crate::geometry::SE3;
use crate::system::{Odometry, OdometryInfo, OdometrySink, PoseStamped, TransformStamped};

/// Streams odometer output to a spawned rerun viewer.
pub struct RerunSink {
    rec: RecordingStream,
    trajectory: Vec<Vector3<f64>>,
    start_timestamp_ns: Option<u64>,
}

impl RerunSink {
    pub fn spawn(app_name: &str) -> Result<Self> {
        // Runs rerun viewer in a separate process
        let rec = rerun::RecordingStreamBuilder::new(app_name)
            .spawn()
            .context("Failed to spawn rerun viewer")?;
        rec.log_static("world", &rerun::ViewCoordinates::RFU()).ok();

        Ok(Self {
            rec,
            trajectory: Vec::new(),
            start_timestamp_ns: None,
        })
    }

    /// Time relative to the first record seen.
    fn set_time(&mut self, timestamp_ns: u64) {
        let start_ns = *self.start_timestamp_ns.get_or_insert(timestamp_ns);
        let relative_sec = timestamp_ns.saturating_sub(start_ns) as f64 / 1e9;
        self.rec.set_duration_secs("time", relative_sec);
    }

    fn log_pose(&self, pose: &SE3) {
        let translation = glam::Vec3::new(
            pose.translation.x as f32,
            pose.translation.y as f32,
            pose.translation.z as f32,
        );
        let rotation = glam::Quat::from_xyzw(
            pose.rotation.coords.x as f32,
            pose.rotation.coords.y as f32,
            pose.rotation.coords.z as f32,
            pose.rotation.w as f32,
        );
        self.rec
            .log(
                "world/base",
                &rerun::Transform3D::from_translation_rotation(translation, rotation),
            )
            .ok();
    }

    fn log_trajectory(&self) {
        if self.trajectory.len() < 2 {
            return;
        }
        let pts: Vec<[f32; 3]> = self
            .trajectory
            .iter()
            .map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect();
        self.rec
            .log(
                "world/trajectory",
                &rerun::LineStrips3D::new([pts])
                    .with_colors([[128u8, 128, 128]])
                    .with_radii([0.005f32]),
            )
            .ok();
    }
}

impl OdometrySink for RerunSink {
    fn publish_odometry(&mut self, msg: &Odometry) {
        self.set_time(msg.header.stamp_ns);
        self.log_pose(&msg.pose);
        self.trajectory.push(msg.pose.translation);
        self.log_trajectory();

        if let Some(twist) = &msg.twist {
            self.rec
                .log("plots/speed", &rerun::Scalars::new([twist.linear.norm()]))
                .ok();
        }
    }

    fn publish_pose(&mut self, _msg: &PoseStamped) {}

    fn publish_transform(&mut self, msg: &TransformStamped) {
        // Idle republish: keep the pose visible without extending the path.
        self.set_time(msg.header.stamp_ns);
        self.log_pose(&msg.transform);
    }

    fn publish_info(&mut self, msg: &OdometryInfo) {
        self.set_time(msg.header.stamp_ns);
        let status_text = format!(
            "**{}** | Keypoints: {} | Matches: {} | Inliers: {} | Runtime: {:.1} ms",
            msg.motion_estimate_status,
            msg.num_total_keypoints,
            msg.num_matches,
            msg.num_inliers,
            msg.runtime * 1e3
        );
        self.rec
            .log(
                "status",
                &rerun::TextDocument::new(status_text)
                    .with_media_type(rerun::MediaType::markdown()),
            )
            .ok();
        self.rec
            .log("plots/inliers", &rerun::Scalars::new([msg.num_inliers as f64]))
            .ok();
    }
}
