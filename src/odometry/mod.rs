//! Pose integration: consumes frame-to-frame motion estimates and maintains
//! the robot pose in a fixed world frame.
//!
//! - Frame processor capability and its ownership slot
//! - Anchor / re-anchor state machine with NaN recovery
//! - Twist derivation between consecutive successful frames
//! - Per-frame diagnostics

pub mod integrator;
pub mod options;
pub mod processor;
pub mod result;
pub mod state;
pub mod velocity;

pub use integrator::PoseIntegrator;
pub use options::VoOptions;
pub use processor::{
    FeatureStats, FrameProcessor, LevelStats, MotionEstimate, MotionStatus, ProcessorFactory,
    ProcessorSlot,
};
pub use result::{FrameDiagnostic, FrameOutcome, FrameOutput};
pub use state::{AnchorMode, IntegratorPhase};
pub use velocity::{Twist, VelocityEstimator};
