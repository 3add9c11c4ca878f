//! Publisher sink: where odometer output goes.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

use super::messages::{Odometry, OdometryInfo, OdometryMessage, PoseStamped, TransformStamped};

/// Transport-specific emission of odometer output.
///
/// Called with the odometer lock held; implementations should not block
/// for long.
pub trait OdometrySink: Send {
    fn publish_odometry(&mut self, msg: &Odometry);
    fn publish_pose(&mut self, msg: &PoseStamped);
    fn publish_transform(&mut self, msg: &TransformStamped);
    fn publish_info(&mut self, msg: &OdometryInfo);

    /// Push buffered records out. Publishing itself never fails; this is
    /// where a sink reports write errors.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Forwards every record over a crossbeam channel.
///
/// A disconnected receiver is not an error; records are dropped.
pub struct ChannelSink {
    sender: Sender<OdometryMessage>,
}

impl ChannelSink {
    pub fn new(sender: Sender<OdometryMessage>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end of an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<OdometryMessage>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }

    fn send(&self, msg: OdometryMessage) {
        if self.sender.send(msg).is_err() {
            debug!("Odometry receiver disconnected, dropping message");
        }
    }
}

impl OdometrySink for ChannelSink {
    fn publish_odometry(&mut self, msg: &Odometry) {
        self.send(OdometryMessage::Odometry(msg.clone()));
    }

    fn publish_pose(&mut self, msg: &PoseStamped) {
        self.send(OdometryMessage::Pose(msg.clone()));
    }

    fn publish_transform(&mut self, msg: &TransformStamped) {
        self.send(OdometryMessage::Transform(msg.clone()));
    }

    fn publish_info(&mut self, msg: &OdometryInfo) {
        self.send(OdometryMessage::Info(msg.clone()));
    }
}

/// Fans records out to several sinks in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn OdometrySink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn OdometrySink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl OdometrySink for MultiSink {
    fn publish_odometry(&mut self, msg: &Odometry) {
        self.sinks.iter_mut().for_each(|s| s.publish_odometry(msg));
    }

    fn publish_pose(&mut self, msg: &PoseStamped) {
        self.sinks.iter_mut().for_each(|s| s.publish_pose(msg));
    }

    fn publish_transform(&mut self, msg: &TransformStamped) {
        self.sinks.iter_mut().for_each(|s| s.publish_transform(msg));
    }

    fn publish_info(&mut self, msg: &OdometryInfo) {
        self.sinks.iter_mut().for_each(|s| s.publish_info(msg));
    }

    fn flush(&mut self) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.flush())
    }
}
