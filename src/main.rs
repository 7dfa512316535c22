use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use govle::{color, Animation, BleTransport, Config, Device, ProtocolTable};

/// Keep roughly this many frames queued while animating, so Ctrl-C is not
/// stuck behind minutes of buffered animation.
const ANIMATION_BACKLOG: usize = 32;

const DISCOVER_WINDOW: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "govle")]
#[command(about = "Govee BLE LED strip control\n\nEncodes vendor command frames and drives them over the BLE link.", long_about = None)]
struct Cli {
    /// Device name from the config, or a literal BLE address
    device: Option<String>,

    /// Operation to perform
    #[arg(short, long, value_enum, default_value = "on")]
    operation: Operation,

    /// Brightness level 0-255 (for brightness)
    #[arg(short, long)]
    level: Option<i32>,

    /// Color as R G B (for color; also the slide foreground)
    #[arg(short, long, num_args = 3, value_names = ["R", "G", "B"])]
    color: Option<Vec<i32>>,

    /// Animation cycles to run (for slide)
    #[arg(short = 'n', long, default_value_t = 1)]
    cycles: u32,

    /// Path to configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq)]
enum Operation {
    /// Power the strip on
    On,
    /// Power the strip off
    Off,
    /// Enable gradient blending
    GradientOn,
    /// Disable gradient blending
    GradientOff,
    /// Set overall brightness (--level)
    Brightness,
    /// Set the whole strip to one color (--color)
    Color,
    /// Run the slide animation
    Slide,
    /// Scan for nearby BLE devices
    Discover,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "govle=debug" } else { "govle=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_thread_names(true)
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if cli.operation == Operation::Discover {
        return discover();
    }

    // Validate option pairing up front, before touching the radio.
    let device_name = match &cli.device {
        Some(name) => name.as_str(),
        None => bail!("a device name or BLE address is required for this operation"),
    };
    if cli.operation == Operation::Brightness && cli.level.is_none() {
        bail!("brightness requires --level");
    }
    if cli.operation == Operation::Color && cli.color.is_none() {
        bail!("color requires --color R G B");
    }
    let rgb = cli.color.as_ref().map(|c| (c[0], c[1], c[2]));

    let address = config.resolve_address(device_name)?;
    let transport = Box::new(BleTransport::new()?);
    let device = Device::connect(transport, &address, ProtocolTable::GOVEE, config.link)?;

    // Stop long-running operations on Ctrl-C but still disconnect cleanly.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::Relaxed)) {
            eprintln!("Warning: Could not set Ctrl-C handler: {}", e);
        }
    }

    match cli.operation {
        Operation::On => device.set_power(true)?,
        Operation::Off => device.set_power(false)?,
        Operation::GradientOn => device.set_gradient(true)?,
        Operation::GradientOff => device.set_gradient(false)?,
        Operation::Brightness => {
            if let Some(level) = cli.level {
                device.set_brightness(level)?;
            }
        }
        Operation::Color => {
            if let Some(rgb) = rgb {
                device.set_color(rgb)?;
            }
        }
        Operation::Slide => {
            let (foreground, background) = match rgb {
                Some(rgb) => (rgb, color::WHITE),
                None => color::random_complementary_pair(),
            };
            tracing::info!(
                foreground = %color::to_hex(foreground),
                background = %color::to_hex(background),
                cycles = cli.cycles,
                "sliding"
            );
            for _ in 0..cli.cycles {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                device.play_animation(Animation::Slide {
                    foreground,
                    background,
                })?;
                while device.pending() > ANIMATION_BACKLOG && running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
        Operation::Discover => unreachable!("handled above"),
    }

    // Blocks until everything accepted so far is on the wire.
    let discarded = device.disconnect();
    if discarded > 0 {
        tracing::warn!(discarded, "frames discarded at disconnect");
    }
    Ok(())
}

fn discover() -> Result<()> {
    let transport = BleTransport::new()?;
    println!(
        "Scanning for BLE devices ({}s)...",
        DISCOVER_WINDOW.as_secs()
    );
    let mut devices = transport.discover(DISCOVER_WINDOW)?;
    // Strongest signal first; unnamed gear sinks to the bottom.
    devices.sort_by(|a, b| (b.name.is_some(), b.rssi).cmp(&(a.name.is_some(), a.rssi)));
    for device in &devices {
        let rssi = device
            .rssi
            .map_or_else(|| "   ?".to_string(), |r| format!("{r:>4}"));
        let name = device.name.as_deref().unwrap_or("(unknown)");
        println!("  {}  {}  {}", device.address, rssi, name);
    }
    println!("{} device(s) found", devices.len());
    Ok(())
}
