//! `sentinel` CLI: wires synthetic sensors, the fusion engine, and the
//! output consumers into a live demo system.

use anyhow::{Context, Result};
use clap::Parser;
use fusion_core::engine::FusionEngine;
use fusion_core::system::FusionSystem;
use fusion_core::types::{EntityId, EntityKind, Position, SensorKind, Velocity};
use outputs::{CliVisualizer, PushServer};
use sensor_sim::{EntityTrajectory, SensorParams, SyntheticSensor};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sentinel", about = "Real-time multi-sensor entity fusion demo")]
struct Cli {
    /// Run duration in seconds; runs until Ctrl-C when omitted
    #[arg(long)]
    duration: Option<u64>,

    /// Fused-state output cadence (Hz)
    #[arg(long, default_value_t = 5.0)]
    output_rate: f64,

    /// Stale-entity eviction window (seconds)
    #[arg(long, default_value_t = 15)]
    stale_timeout: u64,

    /// TCP push server port
    #[arg(long, default_value_t = 8080)]
    push_port: u16,

    /// Disable the TCP push server
    #[arg(long)]
    no_push: bool,

    /// Print one line per fused state as it is published
    #[arg(long)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seed for the synthetic sensor noise generators
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

fn build_system(cli: &Cli) -> FusionSystem {
    let engine = Arc::new(FusionEngine::new());
    engine.set_output_rate_hz(cli.output_rate);
    engine.set_stale_entity_timeout(Duration::from_secs(cli.stale_timeout));

    let mut system = FusionSystem::new(engine);

    let mut visualizer = CliVisualizer::new(true);
    visualizer.set_verbose(cli.verbose);
    system.add_output(Arc::new(visualizer));

    if !cli.no_push {
        system.add_output(Arc::new(PushServer::new(cli.push_port)));
    }

    // Demo population: two ground vehicles and one aircraft.
    let vehicle_1 = EntityTrajectory {
        entity_id: EntityId(101),
        entity_kind: EntityKind::Vehicle,
        initial_position: Position::new(0.0, 0.0, 0.0),
        velocity: Velocity::new(15.0, 10.0, 0.0),
    };
    let aircraft = EntityTrajectory {
        entity_id: EntityId(102),
        entity_kind: EntityKind::Aircraft,
        initial_position: Position::new(100.0, 200.0, 50.0),
        velocity: Velocity::new(-20.0, 5.0, 2.0),
    };
    let vehicle_2 = EntityTrajectory {
        entity_id: EntityId(103),
        entity_kind: EntityKind::Vehicle,
        initial_position: Position::new(-50.0, 100.0, 0.0),
        velocity: Velocity::new(8.0, -12.0, 0.0),
    };

    let mut gps = SyntheticSensor::new(
        SensorKind::Gps,
        SensorParams {
            update_rate_hz: 1.0,
            noise_std: 5.0,
            dropout_probability: 0.05,
            ..Default::default()
        },
        cli.seed,
    );
    gps.add_entity(vehicle_1.clone());
    gps.add_entity(aircraft.clone());
    gps.add_entity(vehicle_2.clone());

    let mut radar = SyntheticSensor::new(
        SensorKind::Radar,
        SensorParams {
            update_rate_hz: 5.0,
            noise_std: 3.0,
            dropout_probability: 0.10,
            min_delay_ms: 10,
            max_delay_ms: 50,
        },
        cli.seed.wrapping_add(1),
    );
    radar.add_entity(vehicle_1.clone());
    radar.add_entity(aircraft.clone());
    radar.add_entity(vehicle_2.clone());

    let mut vision = SyntheticSensor::new(
        SensorKind::Vision,
        SensorParams {
            update_rate_hz: 10.0,
            noise_std: 8.0,
            dropout_probability: 0.15,
            ..Default::default()
        },
        cli.seed.wrapping_add(2),
    );
    vision.add_entity(vehicle_1);
    vision.add_entity(vehicle_2);

    system.add_sensor(Box::new(gps));
    system.add_sensor(Box::new(radar));
    system.add_sensor(Box::new(vision));

    system
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    info!("initializing sentinel");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install signal handler")?;
    }

    let mut system = build_system(&cli);
    system.start().context("failed to start fusion system")?;

    println!("\nSentinel running...");
    match cli.duration {
        Some(secs) => println!("Stopping after {secs} s (or Ctrl-C)\n"),
        None => println!("Press Ctrl-C to stop\n"),
    }

    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        if let Some(secs) = cli.duration {
            if started.elapsed() >= Duration::from_secs(secs) {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    println!("\nShutting down...");
    system.stop();
    info!("shutdown complete");

    Ok(())
}
