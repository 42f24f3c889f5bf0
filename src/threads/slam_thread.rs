//! SLAM Thread - the scan path.
//!
//! This thread:
//! - Receives odometry and scans from a crossbeam channel
//! - Buffers odometry for timestamp lookup
//! - Feeds scans through the rolling-window mapper
//! - Stops the daemon on fatal errors
//!
//! Uses `crossbeam::select!` with a short timeout so the `running` flag is
//! checked even when no data arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, select};

use crate::engine::slam::SlamEngine;
use crate::engine::{RollingMapper, ScanOutcome};
use crate::error::Result;
use crate::io::OdometryBuffer;
use crate::io::sim::SensorEvent;

/// Odometry samples kept for scan-time lookup.
pub const ODOMETRY_BUFFER_LEN: usize = 512;

/// Per-event processing state owned by the SLAM thread.
pub struct SlamContext<E: SlamEngine> {
    mapper: RollingMapper<E>,
    odometry: OdometryBuffer,
}

impl<E: SlamEngine> SlamContext<E> {
    pub fn new(mapper: RollingMapper<E>) -> Self {
        Self {
            mapper,
            odometry: OdometryBuffer::new(ODOMETRY_BUFFER_LEN),
        }
    }

    pub fn mapper(&self) -> &RollingMapper<E> {
        &self.mapper
    }

    /// Handle one sensor event. Returns the scan outcome for scans.
    pub fn handle_event(&mut self, event: SensorEvent) -> Result<Option<ScanOutcome>> {
        match event {
            SensorEvent::Odometry(sample) => {
                self.odometry.push(sample);
                Ok(None)
            }
            SensorEvent::Scan(scan) => self.mapper.handle_scan(scan, &self.odometry).map(Some),
        }
    }
}

/// SLAM Thread handle.
pub struct SlamThread {
    handle: JoinHandle<()>,
}

impl SlamThread {
    /// Spawn the SLAM thread.
    pub fn spawn<E: SlamEngine + 'static>(
        mapper: RollingMapper<E>,
        sensor_rx: Receiver<SensorEvent>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("slam".into())
            .spawn(move || run_slam_loop(SlamContext::new(mapper), sensor_rx, running))?;
        Ok(Self { handle })
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run_slam_loop<E: SlamEngine>(
    mut context: SlamContext<E>,
    sensor_rx: Receiver<SensorEvent>,
    running: Arc<AtomicBool>,
) {
    log::info!("SLAM thread starting");

    while running.load(Ordering::Relaxed) {
        select! {
            recv(sensor_rx) -> result => {
                let Ok(event) = result else {
                    log::info!("Sensor stream ended, stopping");
                    running.store(false, Ordering::Relaxed);
                    break;
                };
                if let Err(e) = context.handle_event(event) {
                    if e.is_fatal() {
                        log::error!("Fatal SLAM error: {}", e);
                        running.store(false, Ordering::Relaxed);
                        break;
                    }
                    log::warn!("Scan dropped: {}", e);
                }
            }
            // Timeout to allow checking running flag
            default(Duration::from_millis(10)) => {}
        }
    }

    let stats = context.mapper().stats();
    log::info!(
        "SLAM thread shutdown: {} scans ({} processed, {} skipped, {} throttled, {} without pose), {} resizes, {} aborted, {} map updates",
        stats.scans_received,
        stats.scans_processed,
        stats.scans_skipped,
        stats.scans_throttled,
        stats.pose_failures,
        context.mapper().tracker().resize_count(),
        stats.resize_aborts,
        stats.map_updates
    );
}
