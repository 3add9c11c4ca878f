//! CSV trajectory output.
//!
//! One row per published odometry record:
//! `timestamp_ns, x, y, z, qx, qy, qz, qw, vx, vy, vz, wx, wy, wz`.
//! Velocity columns are empty when no twist was estimated for the frame.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use crate::system::{Odometry, OdometryInfo, OdometrySink, PoseStamped, TransformStamped};

#[derive(Debug, Serialize)]
struct TrajectoryRow {
    timestamp_ns: u64,
    x: f64,
    y: f64,
    z: f64,
    qx: f64,
    qy: f64,
    qz: f64,
    qw: f64,
    vx: Option<f64>,
    vy: Option<f64>,
    vz: Option<f64>,
    wx: Option<f64>,
    wy: Option<f64>,
    wz: Option<f64>,
}

impl From<&Odometry> for TrajectoryRow {
    fn from(msg: &Odometry) -> Self {
        let t = &msg.pose.translation;
        let q = msg.pose.rotation.quaternion();
        let v = msg.twist.as_ref().map(|tw| tw.linear);
        let w = msg.twist.as_ref().map(|tw| tw.angular);
        Self {
            timestamp_ns: msg.header.stamp_ns,
            x: t.x,
            y: t.y,
            z: t.z,
            qx: q.i,
            qy: q.j,
            qz: q.k,
            qw: q.w,
            vx: v.map(|v| v.x),
            vy: v.map(|v| v.y),
            vz: v.map(|v| v.z),
            wx: w.map(|w| w.x),
            wy: w.map(|w| w.y),
            wz: w.map(|w| w.z),
        }
    }
}

/// Writes every published odometry record as a CSV row.
pub struct TrajectoryWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl TrajectoryWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self { writer, rows: 0 })
    }
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush trajectory: {}", e.error()))
    }
}

impl<W: Write + Send> OdometrySink for TrajectoryWriter<W> {
    fn publish_odometry(&mut self, msg: &Odometry) {
        match self.writer.serialize(TrajectoryRow::from(msg)) {
            Ok(()) => self.rows += 1,
            Err(e) => warn!("Failed to write trajectory row: {}", e),
        }
    }

    fn publish_pose(&mut self, _msg: &PoseStamped) {}

    fn publish_transform(&mut self, _msg: &TransformStamped) {}

    fn publish_info(&mut self, _msg: &OdometryInfo) {}

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush trajectory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SE3;
    use crate::system::{Header, TwistWithCovariance};
    use nalgebra::Vector3;

    fn odometry(stamp_ns: u64, x: f64, twist: Option<TwistWithCovariance>) -> Odometry {
        Odometry {
            header: Header::new(stamp_ns, "/odom"),
            child_frame_id: "/base_link".to_string(),
            pose: SE3::from_translation(Vector3::new(x, 0.0, 0.0)),
            twist,
        }
    }

    #[test]
    fn test_rows_with_and_without_twist() {
        let mut writer = TrajectoryWriter::from_writer(Vec::new());
        writer.publish_odometry(&odometry(100, 0.0, None));
        writer.publish_odometry(&odometry(
            200,
            0.5,
            Some(TwistWithCovariance {
                linear: Vector3::new(5.0, 0.0, 0.0),
                angular: Vector3::zeros(),
                covariance: [0.0; 36],
            }),
        ));
        assert_eq!(writer.rows(), 2);

        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp_ns,x,y,z,qx,qy,qz,qw,vx,vy,vz,wx,wy,wz"
        );
        assert_eq!(lines[1], "100,0.0,0.0,0.0,0.0,0.0,0.0,1.0,,,,,,");
        assert_eq!(lines[2], "200,0.5,0.0,0.0,0.0,0.0,0.0,1.0,5.0,0.0,0.0,0.0,0.0,0.0");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_flush_reports_write_failure() {
        let mut writer = TrajectoryWriter::from_writer(FailingWriter);
        writer.publish_odometry(&odometry(1, 1.0, None));

        let err = writer.flush().unwrap_err();
        assert!(err.to_string().contains("Failed to flush trajectory"));
    }

    #[test]
    fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.csv");

        let mut writer = TrajectoryWriter::create(&path).unwrap();
        writer.publish_odometry(&odometry(1, 1.0, None));
        writer.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
