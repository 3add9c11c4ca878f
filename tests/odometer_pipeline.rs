use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use approx::assert_relative_eq;
use crossbeam_channel::Receiver;
use nalgebra::Vector3;

use vo_integrator::config::OdometerConfig;
use vo_integrator::extrinsics::StaticExtrinsics;
use vo_integrator::geometry::SE3;
use vo_integrator::io::{DepthImage, GrayImage, ReplayFactory, parse_replay};
use vo_integrator::odometry::{FrameOutcome, IntegratorPhase, MotionStatus};
use vo_integrator::system::{ChannelSink, Clock, Odometer, OdometryMessage};

const MS: u64 = 1_000_000;
const SEC: u64 = 1_000_000_000;

/// Replay row with identity rotations.
fn row(stamp_ns: u64, status: &str, pose_x: f64, motion_x: f64) -> String {
    format!(
        "{stamp_ns}, {status}, {pose_x},0,0, 1,0,0,0, {motion_x},0,0, 1,0,0,0, \
         0.01,0.01,0.01,0.001,0.001,0.001, 100, 80\n"
    )
}

fn odometer(
    rows: &[String],
    extrinsics: StaticExtrinsics,
    config: OdometerConfig,
) -> (Odometer<ReplayFactory>, Receiver<OdometryMessage>) {
    let frames = parse_replay(rows.concat().as_bytes()).unwrap();
    let (sink, rx) = ChannelSink::unbounded();
    let odometer = Odometer::new(
        ReplayFactory::new(frames),
        Box::new(extrinsics),
        Box::new(sink),
        config,
    );
    (odometer, rx)
}

fn kinds(rx: &Receiver<OdometryMessage>) -> Vec<&'static str> {
    rx.try_iter()
        .map(|msg| match msg {
            OdometryMessage::Odometry(_) => "odometry",
            OdometryMessage::Pose(_) => "pose",
            OdometryMessage::Transform(_) => "transform",
            OdometryMessage::Info(_) => "info",
        })
        .collect()
}

struct ManualClock(AtomicU64);

impl ManualClock {
    fn set(&self, now_ns: u64) {
        self.0.store(now_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[test]
fn test_publishes_pose_twist_and_diagnostics() {
    let mount = SE3::from_translation(Vector3::new(0.1, 0.0, 0.2));
    let extrinsics = StaticExtrinsics::new().with("/base_link", "/camera", mount);
    let rows = [
        row(0, "NO_DATA", 0.0, 0.0),
        row(100 * MS, "SUCCESS", 0.1, 0.1),
        row(200 * MS, "SUCCESS", 0.2, 0.1),
    ];
    let (odometer, rx) = odometer(&rows, extrinsics, OdometerConfig::default());

    let pixels = [0u8; 4];
    let image = GrayImage::new(&pixels, 2, 2, "/camera");
    let depth = DepthImage::new(2, 2, vec![1.0; 4]).unwrap();

    let out = odometer.process(&image, &depth, 0).unwrap();
    assert_eq!(out.diagnostic.outcome, FrameOutcome::Initialized);
    assert!(out.pose.is_none());
    assert_eq!(kinds(&rx), ["info"]);
    assert_eq!(odometer.phase(), IntegratorPhase::Tracking);

    let out = odometer.process(&image, &depth, 100 * MS).unwrap();
    assert_relative_eq!(out.pose.unwrap().translation, Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
    assert!(out.twist.is_none());
    assert_eq!(kinds(&rx), ["transform", "odometry", "pose", "info"]);

    odometer.process(&image, &depth, 200 * MS).unwrap();
    let messages: Vec<OdometryMessage> = rx.try_iter().collect();
    assert_eq!(messages.len(), 4);

    let OdometryMessage::Odometry(odom) = &messages[1] else {
        panic!("expected odometry record, got {:?}", messages[1]);
    };
    assert_eq!(odom.header.frame_id, "/odom");
    assert_eq!(odom.header.stamp_ns, 200 * MS);
    assert_eq!(odom.child_frame_id, "/base_link");
    assert_relative_eq!(odom.pose.translation, Vector3::new(0.2, 0.0, 0.0), epsilon = 1e-12);
    let twist = odom.twist.as_ref().unwrap();
    assert_relative_eq!(twist.linear, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
    assert_relative_eq!(twist.covariance[0], 0.01);

    let OdometryMessage::Info(info) = &messages[3] else {
        panic!("expected info record, got {:?}", messages[3]);
    };
    assert_eq!(info.header.frame_id, "/camera");
    assert_eq!(info.motion_estimate_status, "SUCCESS");
    assert!(info.motion_estimate_valid);
    assert_eq!(info.num_inliers, 80);
}

#[test]
fn test_nan_fault_resumes_from_last_good_pose() {
    let rows = [
        row(0, "NO_DATA", 0.0, 0.0),
        row(100 * MS, "SUCCESS", 0.1, 0.1),
        row(200 * MS, "SUCCESS", f64::NAN, 0.1),
        // Recreated processor: its own origin.
        row(300 * MS, "NO_DATA", 5.0, 0.0),
        row(400 * MS, "SUCCESS", 5.1, 0.1),
        row(500 * MS, "INSUFFICIENT_INLIERS", 5.1, 0.0),
    ];
    let (odometer, rx) = odometer(&rows, StaticExtrinsics::new(), OdometerConfig::default());

    let pixels = [0u8; 1];
    let image = GrayImage::new(&pixels, 1, 1, "/camera");
    let depth = DepthImage::new(1, 1, vec![1.0]).unwrap();

    let outcomes: Vec<FrameOutcome> = (0..rows.len() as u64)
        .map(|i| odometer.process(&image, &depth, i * 100 * MS).unwrap().diagnostic.outcome)
        .collect();
    assert_eq!(
        outcomes,
        [
            FrameOutcome::Initialized,
            FrameOutcome::Updated,
            FrameOutcome::Reanchored,
            FrameOutcome::Initialized,
            FrameOutcome::Updated,
            FrameOutcome::EstimationFailed,
        ]
    );

    // Trajectory continues from 0.1 instead of jumping back to the origin.
    assert_relative_eq!(
        odometer.last_known_pose().translation,
        Vector3::new(0.2, 0.0, 0.0),
        epsilon = 1e-12
    );

    let messages: Vec<OdometryMessage> = rx.try_iter().collect();
    let poses: Vec<f64> = messages
        .iter()
        .filter_map(|msg| match msg {
            OdometryMessage::Pose(p) => Some(p.pose.translation.x),
            _ => None,
        })
        .collect();
    assert_eq!(poses.len(), 2);
    assert_relative_eq!(poses[1], 0.2, epsilon = 1e-12);

    // The rejected frame sends no diagnostics record; nothing claims it valid.
    let info_stamps: Vec<u64> = messages
        .iter()
        .filter_map(|msg| match msg {
            OdometryMessage::Info(info) => Some(info.header.stamp_ns),
            _ => None,
        })
        .collect();
    assert_eq!(info_stamps, [0, 100 * MS, 300 * MS, 400 * MS, 500 * MS]);
}

#[test]
fn test_reinit_restarts_at_identity() {
    let rows = [
        row(0, "NO_DATA", 0.0, 0.0),
        row(100 * MS, "SUCCESS", 0.5, 0.5),
        row(200 * MS, "NO_DATA", 0.5, 0.0),
        row(300 * MS, "SUCCESS", 0.6, 0.1),
    ];
    let (odometer, _rx) = odometer(&rows, StaticExtrinsics::new(), OdometerConfig::default());

    let pixels = [0u8; 1];
    let image = GrayImage::new(&pixels, 1, 1, "/camera");
    let depth = DepthImage::new(1, 1, vec![1.0]).unwrap();

    odometer.process(&image, &depth, 0).unwrap();
    odometer.process(&image, &depth, 100 * MS).unwrap();
    odometer.reinit();
    assert_eq!(odometer.phase(), IntegratorPhase::Uninitialized);

    let out = odometer.process(&image, &depth, 200 * MS).unwrap();
    assert_eq!(out.diagnostic.outcome, FrameOutcome::Initialized);
    assert_eq!(out.diagnostic.status, MotionStatus::NoData);

    let out = odometer.process(&image, &depth, 300 * MS).unwrap();
    assert_relative_eq!(out.pose.unwrap().translation, Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
}

#[test]
fn test_idle_republisher_rebroadcasts_stale_pose() {
    let rows = [row(0, "NO_DATA", 0.0, 0.0), row(100 * MS, "SUCCESS", 0.1, 0.1)];
    let config = OdometerConfig {
        republish_interval_s: 0.005,
        ..Default::default()
    };
    let (mut odometer, rx) = odometer(&rows, StaticExtrinsics::new(), config);

    let pixels = [0u8; 1];
    let image = GrayImage::new(&pixels, 1, 1, "/camera");
    let depth = DepthImage::new(1, 1, vec![1.0]).unwrap();
    odometer.process(&image, &depth, 0).unwrap();
    odometer.process(&image, &depth, 100 * MS).unwrap();
    rx.try_iter().for_each(drop);

    let clock = Arc::new(ManualClock(AtomicU64::new(100 * MS + 5 * SEC)));
    odometer.start_idle_republisher(clock.clone()).unwrap();

    // Fresh enough: the timer ticks but nothing goes out.
    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());

    let stale = 100 * MS + 9 * SEC + 500 * MS;
    clock.set(stale);
    let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let OdometryMessage::Transform(tf) = msg else {
        panic!("expected transform, got {:?}", msg);
    };
    assert_eq!(tf.header.stamp_ns, stale);
    assert_eq!(tf.child_frame_id, "/base_link");
    assert_relative_eq!(tf.transform.translation, Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);

    // Republishing counts as publishing.
    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());

    odometer.shutdown();
}

#[test]
fn test_no_transforms_when_broadcast_disabled() {
    let rows = [row(0, "NO_DATA", 0.0, 0.0), row(100 * MS, "SUCCESS", 0.1, 0.1)];
    let config = OdometerConfig {
        publish_tf: false,
        ..Default::default()
    };
    let (odometer, rx) = odometer(&rows, StaticExtrinsics::new(), config);

    let pixels = [0u8; 1];
    let image = GrayImage::new(&pixels, 1, 1, "/camera");
    let depth = DepthImage::new(1, 1, vec![1.0]).unwrap();
    odometer.process(&image, &depth, 0).unwrap();
    odometer.process(&image, &depth, 100 * MS).unwrap();

    assert_eq!(kinds(&rx), ["info", "odometry", "pose", "info"]);
    assert!(!odometer.publish_last_known_pose(100 * SEC));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_contract_violation_is_an_error() {
    let rows = [row(0, "NO_DATA", 0.0, 0.0)];
    let (odometer, rx) = odometer(&rows, StaticExtrinsics::new(), OdometerConfig::default());

    let pixels = [0u8; 2];
    let image = GrayImage::new(&pixels, 2, 2, "/camera");
    let depth = DepthImage::new(2, 2, vec![1.0; 4]).unwrap();

    assert!(odometer.process(&image, &depth, 0).is_err());
    assert_eq!(odometer.phase(), IntegratorPhase::Uninitialized);
    assert!(rx.try_recv().is_err());
}
