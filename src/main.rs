use anyhow::Result;
use nalgebra::Vector3;
use tracing::{info, warn};

use vo_integrator::config::OdometerConfig;
use vo_integrator::extrinsics::StaticExtrinsics;
use vo_integrator::io::{DepthImage, GrayImage, ReplayFactory, TrajectoryWriter, load_replay};
use vo_integrator::odometry::FrameOutcome;
use vo_integrator::system::{MultiSink, Odometer};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vo_integrator=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(replay_path) = args.get(1) else {
        eprintln!("usage: {} <replay.csv> [config.yaml] [trajectory_out.csv]", args[0]);
        std::process::exit(2);
    };

    let config = match args.get(2) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            OdometerConfig::load(path)?
        }
        None => OdometerConfig::default(),
    };

    let frames = load_replay(replay_path)?;
    info!("Loaded {} recorded frames from {}", frames.len(), replay_path);
    let stamps: Vec<u64> = frames.iter().map(|f| f.timestamp_ns).collect();

    let extrinsics = StaticExtrinsics::from_config(&config)?;
    if extrinsics.is_empty() {
        warn!("No sensor mounts configured, the sensor frame is taken as the base frame");
    }

    let mut sink = MultiSink::new();
    if let Some(out_path) = args.get(3) {
        sink.push(Box::new(TrajectoryWriter::create(out_path)?));
        info!("Writing trajectory to {}", out_path);
    }
    #[cfg(feature = "rerun")]
    sink.push(Box::new(vo_integrator::viz::RerunSink::spawn("vo_integrator")?));

    let sensor_frame_id = config.sensor_frame_id.clone();
    let mut odometer = Odometer::new(
        ReplayFactory::new(frames),
        Box::new(extrinsics),
        Box::new(sink),
        config,
    );

    // Recorded estimates do not look at pixels; a single-pixel frame
    // satisfies the input contract.
    let pixels = [0u8; 1];
    let image = GrayImage::new(&pixels, 1, 1, &sensor_frame_id);
    let depth = DepthImage::new(1, 1, vec![1.0])?;

    let (mut updated, mut failed, mut reanchored) = (0usize, 0usize, 0usize);
    let mut path_length = 0.0_f64;
    let mut last_position: Option<Vector3<f64>> = None;

    for (i, &stamp_ns) in stamps.iter().enumerate() {
        let output = odometer.process(&image, &depth, stamp_ns)?;
        match output.diagnostic.outcome {
            FrameOutcome::Initialized => info!("Frame {}: odometry (re)initialized", i),
            FrameOutcome::Updated => updated += 1,
            FrameOutcome::EstimationFailed => failed += 1,
            FrameOutcome::Reanchored => reanchored += 1,
        }

        if let Some(pose) = &output.pose {
            if let Some(prev) = last_position {
                path_length += (pose.translation - prev).norm();
            }
            last_position = Some(pose.translation);
        }

        if i % 100 == 0 {
            info!(
                "Frame {}/{} (ts={}): {} inliers, status {}",
                i,
                stamps.len(),
                stamp_ns,
                output.diagnostic.stats.num_inliers,
                output.diagnostic.status
            );
        }
    }

    let final_pose = odometer.last_known_pose();
    info!(
        "Done! {} frames: {} updated, {} failed, {} re-anchored",
        stamps.len(),
        updated,
        failed,
        reanchored
    );
    info!(
        "Final position [{:.3}, {:.3}, {:.3}], path length {:.3} m",
        final_pose.translation.x, final_pose.translation.y, final_pose.translation.z, path_length
    );

    odometer.shutdown();
    odometer.flush()?;
    Ok(())
}
