//! ChalaSLAM daemon - rolling-window particle-filter SLAM
//!
//! Runs the scan path and the publish path on their own threads, fed by a
//! simulated corridor drive.
//!
//! # Usage
//!
//! ```bash
//! # With default config
//! cargo run --release
//!
//! # With custom config file
//! cargo run --release -- --config chala-slam.toml
//!
//! # With command line overrides
//! cargo run --release -- --retention window --generation incremental --duration-s 120
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;

use chala_slam::algorithms::mapping::ScanIntegrator;
use chala_slam::config::Config;
use chala_slam::engine::RollingMapper;
use chala_slam::engine::history::IdAllocator;
use chala_slam::engine::slam::ParticleFilter;
use chala_slam::engine::window::{GenerationMode, Placement, RetentionMode};
use chala_slam::error::Result;
use chala_slam::io::LogSink;
use chala_slam::io::sim::{CorridorSim, SimFeeder};
use chala_slam::state::create_shared_state;
use chala_slam::threads::{Publisher, PublisherThread, SlamThread};

/// Sensor events buffered between the simulator and the SLAM thread.
const SENSOR_CHANNEL_LEN: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "chala-slam")]
#[command(about = "Rolling-window occupancy grid SLAM daemon")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// History retention mode
    #[arg(long, value_enum)]
    retention: Option<RetentionMode>,

    /// Map generation mode
    #[arg(long, value_enum)]
    generation: Option<GenerationMode>,

    /// Window placement on resize
    #[arg(long, value_enum)]
    placement: Option<Placement>,

    /// Simulated drive duration in seconds (0 runs until Ctrl-C)
    #[arg(long)]
    duration_s: Option<f32>,

    /// Run the simulation as fast as the mapper keeps up
    #[arg(long)]
    fast: bool,

    /// Write the final map as PGM
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    };

    if let Some(retention) = args.retention {
        config.window.retention = retention;
    }
    if let Some(generation) = args.generation {
        config.window.generation = generation;
    }
    if let Some(placement) = args.placement {
        config.window.placement = placement;
    }
    if let Some(duration_s) = args.duration_s {
        config.simulation.duration_s = duration_s;
    }
    if args.fast {
        config.simulation.realtime = false;
    }
    if let Some(path) = &args.snapshot {
        config.publish.snapshot_path = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    log::info!("chala-slam starting");
    log::info!(
        "  Window: {:.1} m @ {:.3} m/cell ({} placement)",
        config.window.size,
        config.grid.resolution,
        config.window.placement
    );
    log::info!(
        "  Retention: {}, generation: {}",
        config.window.retention,
        config.window.generation
    );
    log::info!(
        "  Particles: {}, throttle: every {} scan(s)",
        config.filter.particles,
        config.laser.throttle_scans
    );

    // Setup signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    }) {
        log::warn!("Ctrl-C handler not installed: {}", e);
    }

    if let Err(e) = run_daemon(&config, running) {
        log::error!("Daemon error: {}", e);
        std::process::exit(1);
    }

    log::info!("chala-slam shutdown complete");
}

fn run_daemon(config: &Config, running: Arc<AtomicBool>) -> Result<()> {
    // 1. Shared state
    let shared = create_shared_state();

    // 2. Engine and mapper
    let engine = ParticleFilter::new(
        config.filter.clone(),
        config.grid.clone(),
        ScanIntegrator::new(config.integrator_config()),
        IdAllocator::new(),
    );
    let mapper = RollingMapper::new(engine, config.mapper_config(), shared.clone())?;

    // 3. Threads
    let (sensor_tx, sensor_rx) = crossbeam_channel::bounded(SENSOR_CHANNEL_LEN);
    let slam_thread = SlamThread::spawn(mapper, sensor_rx, running.clone())?;
    let publisher_thread = PublisherThread::spawn(
        Publisher::new(shared.clone(), Box::new(LogSink)),
        config.publish_period(),
        running.clone(),
    )?;
    let sim = CorridorSim::new(config.simulation.clone(), config.laser.max_range);
    let feeder = SimFeeder::spawn(sim, sensor_tx, running.clone())?;

    // 4. Wait for shutdown (Ctrl-C, end of input, or fatal error)
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down, waiting for threads...");
    if let Err(e) = feeder.join() {
        log::error!("Simulation thread panicked: {:?}", e);
    }
    if let Err(e) = slam_thread.join() {
        log::error!("SLAM thread panicked: {:?}", e);
    }
    if let Err(e) = publisher_thread.join() {
        log::error!("Publisher thread panicked: {:?}", e);
    }

    // 5. Final map export
    if let Some(path) = &config.publish.snapshot_path {
        match shared.snapshots().latest() {
            Ok(snapshot) => snapshot.write_pgm(path)?,
            Err(e) => log::warn!("No map to export: {}", e),
        }
    }

    Ok(())
}
