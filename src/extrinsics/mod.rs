//! Base → sensor extrinsics lookup.
//!
//! The resolver answers "where is this sensor frame on the base?". When it
//! cannot, the integrator assumes identity and warns at most once per
//! [`EXTRINSICS_WARN_INTERVAL`].

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::OdometerConfig;
use crate::geometry::SE3;

/// Minimum spacing between "extrinsics unavailable" warnings.
pub const EXTRINSICS_WARN_INTERVAL: Duration = Duration::from_secs(10);

/// No known relation between two frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicsError {
    pub base_frame: String,
    pub sensor_frame: String,
    pub reason: String,
}

impl fmt::Display for ExtrinsicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no transform from '{}' to '{}': {}",
            self.base_frame, self.sensor_frame, self.reason
        )
    }
}

impl std::error::Error for ExtrinsicsError {}

/// Lookup of the base → sensor transform. Must not block indefinitely.
pub trait ExtrinsicsResolver: Send {
    fn lookup(
        &self,
        base_frame: &str,
        sensor_frame: &str,
        stamp_ns: u64,
    ) -> Result<SE3, ExtrinsicsError>;
}

/// Fixed table of mounting transforms keyed by (base, sensor) frame.
#[derive(Debug, Clone, Default)]
pub struct StaticExtrinsics {
    transforms: HashMap<(String, String), SE3>,
}

impl StaticExtrinsics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T_base_sensor`. The inverse relation is answered too.
    pub fn insert(&mut self, base_frame: &str, sensor_frame: &str, t_base_sensor: SE3) {
        self.transforms
            .insert((base_frame.to_string(), sensor_frame.to_string()), t_base_sensor);
    }

    pub fn with(mut self, base_frame: &str, sensor_frame: &str, t_base_sensor: SE3) -> Self {
        self.insert(base_frame, sensor_frame, t_base_sensor);
        self
    }

    /// Table of the mounts listed in the config.
    pub fn from_config(config: &OdometerConfig) -> Result<Self> {
        let mut table = Self::new();
        for mount in &config.mounts {
            let t_base_sensor = mount
                .t_base_sensor
                .to_se3()
                .with_context(|| format!("mount of '{}'", mount.sensor_frame))?;
            table.insert(config.mount_base_frame(mount), &mount.sensor_frame, t_base_sensor);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl ExtrinsicsResolver for StaticExtrinsics {
    fn lookup(
        &self,
        base_frame: &str,
        sensor_frame: &str,
        _stamp_ns: u64,
    ) -> Result<SE3, ExtrinsicsError> {
        if base_frame == sensor_frame {
            return Ok(SE3::identity());
        }
        let key = (base_frame.to_string(), sensor_frame.to_string());
        if let Some(t) = self.transforms.get(&key) {
            return Ok(t.clone());
        }
        let reverse = (sensor_frame.to_string(), base_frame.to_string());
        if let Some(t) = self.transforms.get(&reverse) {
            return Ok(t.inverse());
        }
        Err(ExtrinsicsError {
            base_frame: base_frame.to_string(),
            sensor_frame: sensor_frame.to_string(),
            reason: format!("{} registered transforms, none match", self.transforms.len()),
        })
    }
}

/// Lets a message through at most once per interval.
#[derive(Debug, Clone)]
pub struct WarnThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl WarnThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a message may be emitted at `now`; records it if so.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for WarnThrottle {
    fn default() -> Self {
        Self::new(EXTRINSICS_WARN_INTERVAL)
    }
}

/// Resolve `T_base_sensor`, substituting identity when unavailable.
///
/// Returns the transform and whether it was actually found.
pub fn resolve_or_identity(
    resolver: &dyn ExtrinsicsResolver,
    throttle: &mut WarnThrottle,
    base_frame: &str,
    sensor_frame: &str,
    stamp_ns: u64,
) -> (SE3, bool) {
    match resolver.lookup(base_frame, sensor_frame, stamp_ns) {
        Ok(t) => (t, true),
        Err(e) => {
            if throttle.allow(Instant::now()) {
                warn!(
                    "The transform from '{}' to '{}' does not seem to be available, \
                     will assume it as identity!",
                    base_frame, sensor_frame
                );
            }
            debug!("Transform error: {}", e);
            (SE3::identity(), false)
        }
    }
}
