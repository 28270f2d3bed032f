use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use midicap_core::{
    list_input_ports, CaptureConfig, CaptureController, ConfigManager, DeviceInjector,
    DevicePoller, EventTable, ExperimentClock, MidiMessage, PollerConfig, ReleasePolicy,
    VirtualDevice,
};

/// Capture MIDI key presses and releases for a fixed duration.
#[derive(Parser, Debug)]
#[command(name = "midicap")]
#[command(about = "MIDI keystroke capture for timed experiments")]
struct Args {
    /// MIDI input device name (substring match)
    #[arg(short, long)]
    device: Option<String>,

    /// How long to collect for
    #[arg(long, default_value = "10")]
    duration_secs: u64,

    /// JSON config file; created with defaults if missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum wait per device read in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Handling of a release with no pending press: drop or error
    #[arg(long)]
    release_policy: Option<ReleasePolicy>,

    /// List available MIDI input ports and exit
    #[arg(short, long)]
    list: bool,

    /// Print one JSON object per event instead of a table
    #[arg(long)]
    json: bool,

    /// Capture from a simulated keyboard instead of a real device
    #[arg(long)]
    demo: bool,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.list {
        let ports = list_input_ports(&config.client_name)?;
        if ports.is_empty() {
            println!("No MIDI input ports found");
        }
        for (index, name) in ports.iter().enumerate() {
            println!("{}: {}", index, name);
        }
        return Ok(());
    }

    let (mut controller, injector) = if args.demo {
        let (device, injector) = VirtualDevice::new("demo keyboard");
        let poller = DevicePoller::new(device, PollerConfig::from(&config));
        (CaptureController::new(poller), Some(injector))
    } else {
        let controller = CaptureController::open(&config)
            .with_context(|| format!("could not open MIDI device '{}'", config.device_name))?;
        (controller, None)
    };

    let clock = Arc::new(ExperimentClock::new());
    controller.register_clock(clock.clone());

    let duration = Duration::from_secs(args.duration_secs);
    controller.start_collection()?;
    clock.reset();

    match injector {
        Some(injector) => play_demo(injector, duration),
        None => thread::sleep(duration),
    }

    controller.stop_collection()?;

    let events = controller.take_events();
    if args.json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
    } else {
        if let Some(started_at) = controller.started_at() {
            println!("Session started at {}", started_at.to_rfc3339());
        }
        print!("{}", EventTable(&events));
    }

    Ok(())
}

/// Layer CLI flags over the config file (or defaults).
fn resolve_config(args: &Args) -> Result<CaptureConfig, anyhow::Error> {
    let mut config = match &args.config {
        Some(path) => ConfigManager::new(Some(path.clone()))
            .load()
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CaptureConfig::default(),
    };

    if let Some(device) = &args.device {
        config.device_name = device.clone();
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        config.poll_interval_ms = poll_interval_ms;
    }
    if let Some(release_policy) = args.release_policy {
        config.release_policy = release_policy;
    }

    ConfigManager::validate(&config)
        .map_err(|errors| anyhow::anyhow!("invalid settings: {}", errors.join(", ")))?;
    Ok(config)
}

/// Play a C major scale, one key per 250ms, until `duration` runs out.
fn play_demo(injector: DeviceInjector, duration: Duration) {
    const SCALE: [u8; 8] = [60, 62, 64, 65, 67, 69, 71, 72];
    let stroke = Duration::from_millis(250);
    let held = Duration::from_millis(120);

    let mut elapsed = Duration::ZERO;
    for (i, note) in SCALE.iter().cycle().enumerate() {
        if elapsed + stroke > duration {
            break;
        }
        let velocity = 60 + (i % 4) as u8 * 15;
        injector.send(MidiMessage::note_on(*note, velocity));
        thread::sleep(held);
        injector.send(MidiMessage::note_on(*note, 0));
        thread::sleep(stroke - held);
        elapsed += stroke;
    }

    thread::sleep(duration.saturating_sub(elapsed));
}
