//! Frame inputs and recorded data.

pub mod image;
pub mod replay;
pub mod trajectory;

pub use image::{DepthImage, DepthSource, GrayImage};
pub use replay::{ReplayFactory, ReplayFrame, ReplayProcessor, load_replay, parse_replay};
pub use trajectory::TrajectoryWriter;
