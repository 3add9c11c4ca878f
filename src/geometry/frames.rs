//! Coordinate frame bookkeeping between the robot base and the camera.
//!
//! # Frames
//!
//! - **World (odom)**: fixed frame in which the integrated pose is published.
//! - **Base**: the robot body (`base_link`).
//! - **Sensor**: the camera optical frame the frame processor works in.
//!
//! The frame processor reports the camera pose relative to the camera pose it
//! had when the processor was created, `T_s0_s`. To express that as a base
//! pose in the world, it is sandwiched between the anchor (where sensor frame
//! `s0` sits in the world) and the inverse mounting transform:
//!
//! ```text
//! T_world_base = T_world_s0 * T_s0_s * T_sensor_base
//!              = anchor     * sensor_pose * T_base_sensor^-1
//! ```
//!
//! Frame-to-frame sensor motion is conjugated the same way to express it in
//! the base frame:
//!
//! ```text
//! dT_base = T_base_sensor * dT_sensor * T_base_sensor^-1
//! ```
//!
//! The same mounting transform is used at both ends of the motion, which is
//! exact only for a rigidly mounted camera.
//!
//! # Naming
//!
//! `T_target_source` maps points from `source` into `target`:
//! `p_base = T_base_sensor * p_sensor`.

use super::SE3;

/// Camera mounting on the robot base, with its inverse cached.
#[derive(Debug, Clone)]
pub struct SensorMount {
    /// Base → sensor extrinsics (`T_base_sensor`).
    pub t_base_sensor: SE3,

    /// Inverse: `T_sensor_base`.
    pub t_sensor_base: SE3,
}

impl SensorMount {
    pub fn new(t_base_sensor: SE3) -> Self {
        let t_sensor_base = t_base_sensor.inverse();
        Self {
            t_base_sensor,
            t_sensor_base,
        }
    }

    /// Camera coincides with the base.
    pub fn identity() -> Self {
        Self::new(SE3::identity())
    }

    /// Base pose in the world from the processor's accumulated sensor pose.
    ///
    /// Formula: `anchor * sensor_pose * T_base_sensor^-1`
    pub fn base_pose_in_world(&self, anchor: &SE3, sensor_pose: &SE3) -> SE3 {
        anchor.compose(sensor_pose).compose(&self.t_sensor_base)
    }

    /// Sensor motion between two frames, expressed in the base frame.
    ///
    /// Formula: `T_base_sensor * motion * T_base_sensor^-1`
    pub fn sensor_motion_to_base(&self, motion: &SE3) -> SE3 {
        self.t_base_sensor.compose(motion).compose(&self.t_sensor_base)
    }

    /// Anchor that places a fresh processor's origin at the sensor's
    /// location when the base is at `base_pose`.
    ///
    /// Formula: `base_pose * T_base_sensor`
    pub fn anchor_at(&self, base_pose: &SE3) -> SE3 {
        base_pose.compose(&self.t_base_sensor)
    }
}
