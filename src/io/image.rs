//! Borrowed image views handed to the frame processor.

use anyhow::{Result, ensure};

/// 8-bit grayscale image borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct GrayImage<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    /// Bytes per row.
    pub stride: usize,
    /// Camera frame the image was captured in.
    pub frame_id: &'a str,
}

impl<'a> GrayImage<'a> {
    /// Densely packed image (`stride == width`).
    pub fn new(data: &'a [u8], width: usize, height: usize, frame_id: &'a str) -> Self {
        Self {
            data,
            width,
            height,
            stride: width,
            frame_id,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Check the layout the frame processor relies on: rows densely packed
    /// and the buffer large enough for every pixel.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.stride == self.width,
            "image row stride {} does not match width {} (images must be densely packed)",
            self.stride,
            self.width
        );
        let needed = self.width * self.height;
        ensure!(
            self.data.len() >= needed,
            "image buffer holds {} bytes, {}x{} needs {}",
            self.data.len(),
            self.width,
            self.height,
            needed
        );
        Ok(())
    }

    pub fn pixel(&self, u: usize, v: usize) -> Option<u8> {
        if u >= self.width || v >= self.height {
            return None;
        }
        self.data.get(v * self.stride + u).copied()
    }
}

/// Source of per-pixel depth consumed by the frame processor.
///
/// The integrator only checks that one is attached; its contents are the
/// processor's business.
pub trait DepthSource: Send {
    /// Depth in meters at pixel `(u, v)`, or `None` where unknown.
    fn depth_at(&self, u: usize, v: usize) -> Option<f64>;

    /// Whether the source has been fed for the current frame.
    fn has_data(&self) -> bool {
        true
    }
}

/// Dense metric depth map registered to the grayscale image.
#[derive(Debug, Clone, Default)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    /// Row-major depth in meters; non-positive or non-finite means unknown.
    pub depth_m: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize, depth_m: Vec<f32>) -> Result<Self> {
        ensure!(
            depth_m.len() == width * height,
            "depth map has {} values, {}x{} needs {}",
            depth_m.len(),
            width,
            height,
            width * height
        );
        Ok(Self {
            width,
            height,
            depth_m,
        })
    }

    /// Replace the depth data for the next frame.
    pub fn set_depth(&mut self, depth_m: Vec<f32>) -> Result<()> {
        ensure!(
            depth_m.len() == self.width * self.height,
            "depth map size changed: got {} values, expected {}",
            depth_m.len(),
            self.width * self.height
        );
        self.depth_m = depth_m;
        Ok(())
    }
}

impl DepthSource for DepthImage {
    fn depth_at(&self, u: usize, v: usize) -> Option<f64> {
        if u >= self.width || v >= self.height {
            return None;
        }
        let d = *self.depth_m.get(v * self.width + u)?;
        (d.is_finite() && d > 0.0).then_some(d as f64)
    }

    fn has_data(&self) -> bool {
        !self.depth_m.is_empty()
    }
}
