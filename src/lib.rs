pub mod config;
pub mod extrinsics;
pub mod geometry;
pub mod io;
pub mod odometry;
pub mod system;
pub mod viz;
