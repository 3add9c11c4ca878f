//! Odometer orchestration: locking, publishing and the idle republisher.
//!
//! This module contains the top-level `Odometer` that guards the pose
//! integrator with a single lock, the publisher sink interface and output
//! records, and the background thread that rebroadcasts the last pose.

pub mod messages;
mod odometer;
pub mod republisher;
pub mod shared_state;
pub mod sink;

pub use messages::{
    Header, Odometry, OdometryInfo, OdometryMessage, PoseStamped, TransformStamped,
    TwistWithCovariance,
};
pub use odometer::Odometer;
pub use republisher::{Clock, IdleRepublisher, SystemClock};
pub use shared_state::{OdometerCore, SharedOdometer};
pub use sink::{ChannelSink, MultiSink, OdometrySink};
