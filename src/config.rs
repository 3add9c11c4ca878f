//! Odometer configuration, loaded once at startup.
//!
//! ```yaml
//! odom_frame_id: /odom
//! base_link_frame_id: /base_link
//! publish_tf: true
//! tf_factor: 1.0
//! republish_interval_s: 1.0
//! vo_options:
//!   fast_threshold_adaptive_gain: "0.001"
//! sensor_frame_id: /camera
//! mounts:
//!   - sensor_frame: /camera
//!     t_base_sensor:
//!       data: [0, 0, 1, 0.1,  -1, 0, 0, 0,  0, -1, 0, 0.2,  0, 0, 0, 1]
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use nalgebra::Matrix4;
use serde::Deserialize;

use crate::geometry::SE3;

/// Pose older than this is rebroadcast by the idle republisher.
pub const IDLE_REPUBLISH_THRESHOLD: Duration = Duration::from_secs(9);

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OdometerConfig {
    /// World frame the pose is published in.
    pub odom_frame_id: String,
    /// Robot base frame whose pose is published.
    pub base_link_frame_id: String,
    /// Broadcast the world → base transform.
    pub publish_tf: bool,
    /// Scale applied to the translation of every published pose. `0` means
    /// unset.
    pub tf_factor: f64,
    /// Period of the idle republish check, seconds.
    pub republish_interval_s: f64,
    /// Frame processor tuning overrides in underscore form, forwarded
    /// verbatim.
    pub vo_options: BTreeMap<String, String>,
    /// Frame id stamped on replayed images.
    pub sensor_frame_id: String,
    /// Known base → sensor mounting transforms.
    pub mounts: Vec<MountConfig>,
}

/// Row-major 4x4 homogeneous transform, `cols`/`rows` optional.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TransformYaml {
    pub data: Vec<f64>,
}

impl TransformYaml {
    pub fn to_se3(&self) -> Result<SE3> {
        if self.data.len() != 16 {
            bail!("Expected 16 elements for transform, got {}", self.data.len());
        }
        ensure!(
            self.data.iter().all(|v| v.is_finite()),
            "transform contains non-finite values"
        );
        Ok(SE3::from_matrix(Matrix4::from_row_slice(&self.data)))
    }
}

/// Where a sensor sits on the robot.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MountConfig {
    /// Defaults to the configured base link frame.
    #[serde(default)]
    pub base_frame: Option<String>,
    pub sensor_frame: String,
    pub t_base_sensor: TransformYaml,
}

impl Default for OdometerConfig {
    fn default() -> Self {
        Self {
            odom_frame_id: "/odom".to_string(),
            base_link_frame_id: "/base_link".to_string(),
            publish_tf: true,
            tf_factor: 1.0,
            republish_interval_s: 1.0,
            vo_options: BTreeMap::new(),
            sensor_frame_id: "/camera".to_string(),
            mounts: Vec::new(),
        }
    }
}

impl OdometerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse odometer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse odometer config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.odom_frame_id.is_empty(), "odom_frame_id must not be empty");
        ensure!(
            !self.base_link_frame_id.is_empty(),
            "base_link_frame_id must not be empty"
        );
        ensure!(self.tf_factor.is_finite(), "tf_factor must be finite");
        ensure!(
            self.republish_interval_s.is_finite() && self.republish_interval_s > 0.0,
            "republish_interval_s must be positive, got {}",
            self.republish_interval_s
        );
        ensure!(!self.sensor_frame_id.is_empty(), "sensor_frame_id must not be empty");
        for mount in &self.mounts {
            mount
                .t_base_sensor
                .to_se3()
                .with_context(|| format!("mount of '{}'", mount.sensor_frame))?;
        }
        Ok(())
    }

    /// Translation correction factor actually applied; `0` falls back to `1`.
    pub fn effective_tf_factor(&self) -> f64 {
        if self.tf_factor == 0.0 {
            1.0
        } else {
            self.tf_factor
        }
    }

    pub fn republish_interval(&self) -> Duration {
        Duration::from_secs_f64(self.republish_interval_s)
    }

    /// Base frame a mount is attached to.
    pub fn mount_base_frame<'a>(&'a self, mount: &'a MountConfig) -> &'a str {
        mount.base_frame.as_deref().unwrap_or(&self.base_link_frame_id)
    }
}
