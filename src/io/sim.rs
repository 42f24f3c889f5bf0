//! Simulated corridor drive.
//!
//! A platform drives along +x down a straight corridor whose walls carry
//! round posts at a fixed spacing, so consecutive scans are not identical.
//! Scans are ray-cast from the platform center; odometry accumulates a
//! small random drift so the filter has something to correct.

use std::f32::consts::{PI, TAU};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::algorithms::localization::NoiseGenerator;
use crate::core::types::{LaserScan, Pose2D, Timestamped};
use crate::error::Result;

/// Sensor samples produced by a platform.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    Odometry(Timestamped<Pose2D>),
    Scan(Timestamped<LaserScan>),
}

/// Corridor simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Forward speed (m/s)
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// Odometry sample rate (Hz)
    #[serde(default = "default_odom_rate_hz")]
    pub odom_rate_hz: f32,

    /// Scans are emitted every this many odometry samples
    #[serde(default = "default_scan_every")]
    pub scan_every: u32,

    /// Corridor width (meters)
    #[serde(default = "default_corridor_width")]
    pub corridor_width: f32,

    /// Distance between wall posts (meters)
    #[serde(default = "default_post_spacing")]
    pub post_spacing: f32,

    /// Wall post radius (meters)
    #[serde(default = "default_post_radius")]
    pub post_radius: f32,

    /// Beams per 360° scan
    #[serde(default = "default_num_rays")]
    pub num_rays: usize,

    /// Range noise standard deviation (meters)
    #[serde(default = "default_range_stddev")]
    pub range_stddev: f32,

    /// Odometry drift per sample (meters, standard deviation)
    #[serde(default = "default_odom_drift")]
    pub odom_drift: f32,

    /// Simulated duration in seconds (0 runs until shutdown)
    #[serde(default = "default_duration_s")]
    pub duration_s: f32,

    /// Pace events in wall-clock time
    #[serde(default = "default_true")]
    pub realtime: bool,

    /// RNG seed (0 = from entropy)
    #[serde(default)]
    pub seed: u64,
}

fn default_speed() -> f32 {
    0.5
}
fn default_odom_rate_hz() -> f32 {
    50.0
}
fn default_scan_every() -> u32 {
    10
}
fn default_corridor_width() -> f32 {
    3.0
}
fn default_post_spacing() -> f32 {
    2.0
}
fn default_post_radius() -> f32 {
    0.15
}
fn default_num_rays() -> usize {
    360
}
fn default_range_stddev() -> f32 {
    0.01
}
fn default_odom_drift() -> f32 {
    0.001
}
fn default_duration_s() -> f32 {
    60.0
}
fn default_true() -> bool {
    true
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            odom_rate_hz: default_odom_rate_hz(),
            scan_every: default_scan_every(),
            corridor_width: default_corridor_width(),
            post_spacing: default_post_spacing(),
            post_radius: default_post_radius(),
            num_rays: default_num_rays(),
            range_stddev: default_range_stddev(),
            odom_drift: default_odom_drift(),
            duration_s: default_duration_s(),
            realtime: default_true(),
            seed: 0,
        }
    }
}

/// Straight corridor along the x axis, centered on y = 0.
#[derive(Debug, Clone)]
pub struct Corridor {
    half_width: f32,
    post_spacing: f32,
    post_radius: f32,
}

impl Corridor {
    pub fn new(width: f32, post_spacing: f32, post_radius: f32) -> Self {
        Self {
            half_width: width * 0.5,
            post_spacing,
            post_radius,
        }
    }

    /// Distance from `(ox, oy)` along `angle` to the first surface.
    ///
    /// Returns `max_range` if nothing is hit.
    pub fn ray_cast(&self, ox: f32, oy: f32, angle: f32, max_range: f32) -> f32 {
        let (dy, dx) = angle.sin_cos();

        let mut best = max_range;
        if dy > 1e-6 {
            best = best.min((self.half_width - oy) / dy);
        } else if dy < -1e-6 {
            best = best.min((-self.half_width - oy) / dy);
        }

        if self.post_spacing > 0.0 && self.post_radius > 0.0 {
            let x_end = ox + dx * best;
            let lo = ((ox.min(x_end) - self.post_radius) / self.post_spacing).floor() as i64;
            let hi = ((ox.max(x_end) + self.post_radius) / self.post_spacing).ceil() as i64;
            for k in lo..=hi {
                for side in [-1.0f32, 1.0] {
                    let cx = k as f32 * self.post_spacing;
                    let cy = side * self.half_width;
                    if let Some(t) = ray_circle(ox - cx, oy - cy, dx, dy, self.post_radius)
                        && t < best
                    {
                        best = t;
                    }
                }
            }
        }

        best.max(0.0)
    }
}

/// Nearest positive hit distance of a unit ray against a circle at the
/// origin, given the ray start relative to the circle center.
fn ray_circle(fx: f32, fy: f32, dx: f32, dy: f32, r: f32) -> Option<f32> {
    let b = fx * dx + fy * dy;
    let c = fx * fx + fy * fy - r * r;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    (t > 0.0).then_some(t)
}

/// Deterministic event generator for a corridor drive.
pub struct CorridorSim {
    config: SimConfig,
    corridor: Corridor,
    noise: NoiseGenerator,
    max_range: f32,
    tick: u64,
    drift: Pose2D,
    pending_scan: Option<Timestamped<LaserScan>>,
}

impl CorridorSim {
    /// Simulator whose scans report up to `max_range`.
    pub fn new(config: SimConfig, max_range: f32) -> Self {
        let corridor = Corridor::new(
            config.corridor_width,
            config.post_spacing,
            config.post_radius,
        );
        let noise = NoiseGenerator::new(config.seed);
        Self {
            config,
            corridor,
            noise,
            max_range,
            tick: 0,
            drift: Pose2D::identity(),
            pending_scan: None,
        }
    }

    fn period_us(&self) -> u64 {
        (1e6 / self.config.odom_rate_hz.max(1e-3)) as u64
    }

    fn finished(&self) -> bool {
        let elapsed_s = (self.tick * self.period_us()) as f32 / 1e6;
        self.config.duration_s > 0.0 && elapsed_s > self.config.duration_s
    }

    /// Ground-truth pose at odometry tick `tick`.
    pub fn true_pose(&self, tick: u64) -> Pose2D {
        let t = (tick * self.period_us()) as f32 / 1e6;
        Pose2D::new(self.config.speed * t, 0.0, 0.0)
    }

    /// Scan seen from `pose` with range noise.
    pub fn scan_at(&mut self, pose: &Pose2D) -> LaserScan {
        let n = self.config.num_rays.max(1);
        let inc = TAU / n as f32;
        let angle_min = -PI;
        let ranges = (0..n)
            .map(|i| {
                let angle = pose.theta + angle_min + i as f32 * inc;
                let d = self.corridor.ray_cast(pose.x, pose.y, angle, self.max_range);
                if d >= self.max_range {
                    self.max_range
                } else {
                    (d + self.noise.gaussian(self.config.range_stddev)).clamp(0.0, self.max_range)
                }
            })
            .collect();
        LaserScan::new(
            angle_min,
            angle_min + (n - 1) as f32 * inc,
            inc,
            0.05,
            self.max_range,
            ranges,
        )
    }
}

impl Iterator for CorridorSim {
    type Item = SensorEvent;

    fn next(&mut self) -> Option<SensorEvent> {
        if let Some(scan) = self.pending_scan.take() {
            return Some(SensorEvent::Scan(scan));
        }
        if self.finished() {
            return None;
        }

        let timestamp_us = 1_000_000 + self.tick * self.period_us();
        let truth = self.true_pose(self.tick);
        if self.tick > 0 {
            self.drift.x += self.noise.gaussian(self.config.odom_drift);
            self.drift.y += self.noise.gaussian(self.config.odom_drift);
        }
        let odom = Pose2D::new(
            truth.x + self.drift.x,
            truth.y + self.drift.y,
            truth.theta,
        );

        if self.tick % u64::from(self.config.scan_every.max(1)) == 0 {
            let scan = self.scan_at(&truth);
            self.pending_scan = Some(Timestamped::new(scan, timestamp_us));
        }
        self.tick += 1;

        Some(SensorEvent::Odometry(Timestamped::new(odom, timestamp_us)))
    }
}

/// Thread pushing simulated events into a channel.
pub struct SimFeeder {
    handle: JoinHandle<()>,
}

impl SimFeeder {
    /// Spawn the feeder. It stops at the end of the simulation, when the
    /// receiver disconnects, or when `running` is cleared.
    pub fn spawn(
        sim: CorridorSim,
        tx: Sender<SensorEvent>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("sim".into())
            .spawn(move || run_feeder(sim, tx, running))?;
        Ok(Self { handle })
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn run_feeder(sim: CorridorSim, tx: Sender<SensorEvent>, running: Arc<AtomicBool>) {
    let realtime = sim.config.realtime;
    let period = Duration::from_micros(sim.period_us());
    log::info!(
        "Simulated corridor starting ({:.1} m/s, {} beams, {})",
        sim.config.speed,
        sim.config.num_rays,
        if realtime { "realtime" } else { "fast" }
    );

    let mut sent = 0u64;
    'events: for event in sim {
        let is_odom = matches!(event, SensorEvent::Odometry(_));
        let mut pending = event;
        loop {
            if !running.load(Ordering::Relaxed) {
                break 'events;
            }
            match tx.send_timeout(pending, Duration::from_millis(50)) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(e)) => pending = e,
                Err(SendTimeoutError::Disconnected(_)) => break 'events,
            }
        }
        sent += 1;
        if realtime && is_odom {
            thread::sleep(period);
        }
    }

    log::info!("Simulated corridor finished after {} events", sent);
}
