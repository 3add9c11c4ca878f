//! Replay of recorded motion estimates.
//!
//! A replay log holds what a frame processor reported for each frame, one
//! CSV row per frame (no header, `#` comments allowed):
//!
//! ```text
//! timestamp_ns, status,
//! pose_tx, pose_ty, pose_tz, pose_qw, pose_qx, pose_qy, pose_qz,
//! motion_tx, motion_ty, motion_tz, motion_qw, motion_qx, motion_qy, motion_qz,
//! cov_x, cov_y, cov_z, cov_roll, cov_pitch, cov_yaw,
//! num_matches, num_inliers
//! ```
//!
//! `status` is a status name (`SUCCESS`) or code (`1`). Non-finite values
//! (`nan`, `inf`) are kept as-is. The pose columns are relative to the
//! recording processor's origin; a replayed processor re-bases them on the
//! first frame it sees, like a freshly created estimator would.

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};
use nalgebra::{Matrix6, Vector3, Vector6};
use parking_lot::Mutex;

use crate::geometry::SE3;
use crate::io::image::{DepthSource, GrayImage};
use crate::odometry::{
    FeatureStats, FrameProcessor, LevelStats, MotionEstimate, MotionStatus, ProcessorFactory,
    VoOptions,
};

const REPLAY_COLUMNS: usize = 24;

/// One recorded frame.
#[derive(Debug, Clone)]
pub struct ReplayFrame {
    pub timestamp_ns: u64,
    pub estimate: MotionEstimate,
}

pub fn load_replay<P: AsRef<Path>>(path: P) -> Result<Vec<ReplayFrame>> {
    let path = path.as_ref();
    let rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    read_frames(rdr).with_context(|| format!("Failed to read replay log {}", path.display()))
}

pub fn parse_replay<R: Read>(reader: R) -> Result<Vec<ReplayFrame>> {
    let rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);
    read_frames(rdr)
}

fn read_frames<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<ReplayFrame>> {
    let mut frames = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        if rec.len() == 1 && rec[0].is_empty() {
            continue;
        }
        if rec.len() < REPLAY_COLUMNS {
            bail!(
                "row {}: expected {} columns, got {}",
                line + 1,
                REPLAY_COLUMNS,
                rec.len()
            );
        }
        frames.push(parse_frame(&rec).with_context(|| format!("row {}", line + 1))?);
    }
    Ok(frames)
}

fn parse_frame(rec: &StringRecord) -> Result<ReplayFrame> {
    let timestamp_ns: u64 = rec[0].parse()?;
    let Some(status) = MotionStatus::parse(&rec[1]) else {
        bail!("unknown motion status '{}'", &rec[1]);
    };
    let f = |i: usize| -> Result<f64> {
        rec[i]
            .parse::<f64>()
            .with_context(|| format!("column {} is not a number: '{}'", i, &rec[i]))
    };

    let relative_pose = SE3::from_raw_parts(
        f(5)?,
        f(6)?,
        f(7)?,
        f(8)?,
        Vector3::new(f(2)?, f(3)?, f(4)?),
    );
    let frame_motion = SE3::from_raw_parts(
        f(12)?,
        f(13)?,
        f(14)?,
        f(15)?,
        Vector3::new(f(9)?, f(10)?, f(11)?),
    );
    let cov_diag = Vector6::new(f(16)?, f(17)?, f(18)?, f(19)?, f(20)?, f(21)?);
    let num_matches: usize = rec[22].parse()?;
    let num_inliers: usize = rec[23].parse()?;

    Ok(ReplayFrame {
        timestamp_ns,
        estimate: MotionEstimate {
            status,
            relative_pose,
            frame_motion,
            covariance: Matrix6::from_diagonal(&cov_diag),
            stats: FeatureStats {
                levels: vec![LevelStats {
                    num_detected_keypoints: num_matches,
                    num_keypoints: num_matches,
                }],
                num_matches,
                num_inliers,
                ..Default::default()
            },
        },
    })
}

type ReplayQueue = Arc<Mutex<VecDeque<ReplayFrame>>>;

/// Creates [`ReplayProcessor`]s that consume one shared log, so a
/// recreated processor picks up where the previous one stopped.
pub struct ReplayFactory {
    queue: ReplayQueue,
    created: usize,
}

impl ReplayFactory {
    pub fn new(frames: Vec<ReplayFrame>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(frames.into())),
            created: 0,
        }
    }

    /// Frames not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of processors created so far.
    pub fn created(&self) -> usize {
        self.created
    }
}

impl ProcessorFactory for ReplayFactory {
    type Processor = ReplayProcessor;

    fn default_options(&self) -> VoOptions {
        [("replay-rebase-on-create", "true")].into_iter().collect()
    }

    fn create(&mut self, options: &VoOptions) -> Result<ReplayProcessor> {
        self.created += 1;
        Ok(ReplayProcessor {
            queue: self.queue.clone(),
            rebase: options.get("replay-rebase-on-create") != Some("false"),
            origin_inv: None,
        })
    }
}

/// Frame processor that returns recorded estimates in order.
pub struct ReplayProcessor {
    queue: ReplayQueue,
    rebase: bool,
    /// Inverse of the recorded pose at this processor's first frame.
    origin_inv: Option<SE3>,
}

impl FrameProcessor for ReplayProcessor {
    fn process_frame(
        &mut self,
        _image: &GrayImage<'_>,
        _depth: &dyn DepthSource,
    ) -> Result<MotionEstimate> {
        let Some(frame) = self.queue.lock().pop_front() else {
            bail!("replay log exhausted");
        };
        let mut estimate = frame.estimate;

        let Some(origin_inv) = &self.origin_inv else {
            // First frame: becomes this processor's reference.
            let origin = &estimate.relative_pose;
            self.origin_inv = Some(if self.rebase && origin.is_finite() {
                origin.inverse()
            } else {
                SE3::identity()
            });
            estimate.status = MotionStatus::NoData;
            return Ok(estimate);
        };

        estimate.relative_pose = origin_inv.compose(&estimate.relative_pose);
        Ok(estimate)
    }
}
