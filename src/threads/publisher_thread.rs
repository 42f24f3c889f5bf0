//! Publisher Thread - the publish path.
//!
//! Ticks on a fixed wall-clock period, independent of scan arrival. Each
//! tick clones the current map slot under its lock, releases the lock,
//! binarises the grid into a [`MapSnapshot`] when its generation changed,
//! stores the snapshot for on-demand queries and hands everything to the
//! sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::io::{MapSink, PublishedMessage};
use crate::state::{MapSnapshot, SharedStateHandle};

/// One publisher tick at a time, usable without a thread.
pub struct Publisher {
    shared: SharedStateHandle,
    sink: Box<dyn MapSink>,
    last_generation: Option<u64>,
    ticks: u64,
}

impl Publisher {
    pub fn new(shared: SharedStateHandle, sink: Box<dyn MapSink>) -> Self {
        Self {
            shared,
            sink,
            last_generation: None,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Publish once. Returns whether a new snapshot was produced.
    pub fn tick(&mut self) -> Result<bool> {
        self.ticks += 1;
        let slot = self.shared.map_slot();

        let mut fresh = false;
        if let Some(grid) = slot.grid
            && self.last_generation != Some(slot.generation)
        {
            let snapshot = Arc::new(MapSnapshot::from_grid(
                &grid,
                slot.generation,
                slot.timestamp_us,
            )?);
            self.shared.snapshots().store(snapshot.clone());
            self.sink.publish(PublishedMessage::Map(snapshot));
            self.sink.publish(PublishedMessage::Path(slot.path));
            if let Some(paths) = slot.all_paths {
                self.sink.publish(PublishedMessage::AllPaths(paths));
            }
            self.last_generation = Some(slot.generation);
            fresh = true;
        }

        self.sink
            .publish(PublishedMessage::Transform(self.shared.transform()));
        self.sink
            .publish(PublishedMessage::Entropy(self.shared.entropy()));

        log::trace!(
            "Publish tick {} (generation {:?}, fresh {})",
            self.ticks,
            self.last_generation,
            fresh
        );
        Ok(fresh)
    }
}

/// Publisher Thread handle.
pub struct PublisherThread {
    handle: JoinHandle<()>,
}

impl PublisherThread {
    /// Spawn the publisher thread ticking every `period`.
    pub fn spawn(
        publisher: Publisher,
        period: Duration,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("publisher".into())
            .spawn(move || run_publisher_loop(publisher, period, running))?;
        Ok(Self { handle })
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run_publisher_loop(mut publisher: Publisher, period: Duration, running: Arc<AtomicBool>) {
    log::info!("Publisher thread starting ({:?} period)", period);

    let mut next_tick = Instant::now();
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= next_tick {
            match publisher.tick() {
                Ok(true) => log::debug!("Published map snapshot"),
                Ok(false) => {}
                Err(e) => log::error!("Publish failed: {}", e),
            }
            next_tick += period;
            if next_tick < now {
                next_tick = now + period;
            }
        }
        let wait = next_tick.saturating_duration_since(Instant::now());
        thread::sleep(wait.min(Duration::from_millis(10)));
    }

    // Final tick so the latest map is available after shutdown.
    if let Err(e) = publisher.tick() {
        log::error!("Final publish failed: {}", e);
    }
    log::info!("Publisher thread shutdown after {} ticks", publisher.ticks());
}
