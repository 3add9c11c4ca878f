//! Twist derivation from consecutive successful frames.

use nalgebra::{Matrix6, Vector3};

use crate::geometry::{SE3, SensorMount};

/// Linear and angular velocity of the base, in the base frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Twist {
    /// m/s
    pub linear: Vector3<f64>,
    /// rad/s, as rotation axis times angle over elapsed time.
    pub angular: Vector3<f64>,
    /// Ordered (linear xyz, angular xyz).
    pub covariance: Matrix6<f64>,
}

impl Twist {
    /// Velocity from a base-frame motion over `dt_s` seconds.
    ///
    /// The covariance is the motion covariance transposed into twist
    /// ordering, not scaled by `dt²`.
    pub fn from_base_motion(base_motion: &SE3, covariance: &Matrix6<f64>, dt_s: f64) -> Self {
        let (axis, angle) = base_motion.axis_angle();
        Self {
            linear: base_motion.translation / dt_s,
            angular: axis * angle / dt_s,
            covariance: covariance.transpose(),
        }
    }
}

/// Tracks the stamp of the last successful estimate and turns frame motion
/// into a twist when a valid previous sample exists.
#[derive(Debug, Clone, Default)]
pub struct VelocityEstimator {
    /// Stamp (ns) of the last successful update. `None` disables velocity
    /// on the next success; a zero stamp is never stored.
    last_stamp_ns: Option<u64>,
}

impl VelocityEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_stamp_ns(&self) -> Option<u64> {
        self.last_stamp_ns
    }

    /// Seconds since the last successful update, if positive.
    pub fn elapsed_s(&self, stamp_ns: u64) -> Option<f64> {
        let last = self.last_stamp_ns?;
        (stamp_ns > last).then(|| (stamp_ns - last) as f64 * 1e-9)
    }

    /// Record a successful frame and derive the twist spanning it.
    ///
    /// `sensor_motion` is the processor's frame-to-frame camera motion; it is
    /// moved into the base frame with the current mounting.
    pub fn update(
        &mut self,
        stamp_ns: u64,
        mount: &SensorMount,
        sensor_motion: &SE3,
        covariance: &Matrix6<f64>,
    ) -> Option<Twist> {
        let twist = self.elapsed_s(stamp_ns).map(|dt| {
            let base_motion = mount.sensor_motion_to_base(sensor_motion);
            Twist::from_base_motion(&base_motion, covariance, dt)
        });
        // Zero is the unset stamp: nothing to measure the next frame against.
        self.last_stamp_ns = (stamp_ns != 0).then_some(stamp_ns);
        twist
    }

    /// Forget the previous sample so no velocity spans a gap.
    pub fn invalidate(&mut self) {
        self.last_stamp_ns = None;
    }
}
