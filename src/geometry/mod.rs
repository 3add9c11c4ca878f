//! Geometry utilities: SE3 transforms, base/sensor frame conversions.

pub mod frames;
pub mod se3;

pub use frames::SensorMount;
pub use se3::SE3;
