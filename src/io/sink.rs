//! Outbound publication.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};

use crate::core::types::Pose2D;
use crate::state::{MapSnapshot, MapTransform};

/// One message emitted by the publish loop.
#[derive(Debug, Clone)]
pub enum PublishedMessage {
    Map(Arc<MapSnapshot>),
    Transform(MapTransform),
    Entropy(f64),
    Path(Arc<Vec<Pose2D>>),
    /// Every particle's trajectory, in particle order.
    AllPaths(Arc<Vec<Vec<Pose2D>>>),
}

/// Destination for published maps, transforms and metrics.
pub trait MapSink: Send {
    fn publish(&mut self, message: PublishedMessage);
}

/// Forwards messages over a bounded channel, dropping when the consumer
/// falls behind.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<PublishedMessage>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<PublishedMessage>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Messages dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl MapSink for ChannelSink {
    fn publish(&mut self, message: PublishedMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::debug!("Sink channel full, dropped {} messages", self.dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("Sink channel disconnected");
            }
        }
    }
}

/// Logs a one-line summary of every message.
#[derive(Debug, Default)]
pub struct LogSink;

impl MapSink for LogSink {
    fn publish(&mut self, message: PublishedMessage) {
        match message {
            PublishedMessage::Map(snap) => {
                let (free, unknown, occupied) = snap.count_cells();
                let (ox, oy) = snap.origin();
                log::info!(
                    "Map gen {}: {}x{} @ ({:.2}, {:.2}), free={} occupied={} unknown={}",
                    snap.generation(),
                    snap.width(),
                    snap.height(),
                    ox,
                    oy,
                    free,
                    occupied,
                    unknown
                );
            }
            PublishedMessage::Transform(t) => log::debug!(
                "map->odom: ({:.3}, {:.3}, {:.3})",
                t.map_to_odom.x,
                t.map_to_odom.y,
                t.map_to_odom.theta
            ),
            PublishedMessage::Entropy(h) => log::debug!("Pose entropy: {:.4}", h),
            PublishedMessage::Path(path) => log::debug!("Path: {} poses", path.len()),
            PublishedMessage::AllPaths(paths) => log::debug!(
                "All paths: {} particles, {} poses",
                paths.len(),
                paths.iter().map(Vec::len).sum::<usize>()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (tx, rx) = bounded(1);
        let mut sink = ChannelSink::new(tx);
        sink.publish(PublishedMessage::Entropy(0.5));
        sink.publish(PublishedMessage::Entropy(0.7));
        assert_eq!(sink.dropped(), 1);

        match rx.try_recv().unwrap() {
            PublishedMessage::Entropy(h) => assert_eq!(h, 0.5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_tolerates_disconnect() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        sink.publish(PublishedMessage::Entropy(0.0));
        assert_eq!(sink.dropped(), 0);
    }
}
