//! # OpenAero IO bench
//!
//! Runs the flight I/O pipeline against a simulated board and receiver.
//!
//! The receiver follows a fixed stick script: sticks centered with throttle
//! at idle (optionally long enough to calibrate centers), full right yaw to
//! arm, then a slow roll sweep at part throttle. Each tick reads the
//! channels, passes them straight through to the outputs and emits one
//! output frame.
//!
//! # Usage
//!
//! ```bash
//! openaero-io [config.toml] [--frames N]
//! ```
//!
//! Expected output:
//! ```text
//! INFO openaero_io: OpenAero IO v0.1.0 starting...
//! INFO openaero_io: Input Pwm, 8 channels; output 50Hz, mask 0xff
//! INFO openaero_io::safety::arming: Armed
//! INFO openaero_io: 500 output frames, state armed, 0 overruns, 0 jitter events
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use openaero_io::capture::{RcInputState, MAX_RC_CHANNELS};
use openaero_io::config::{Config, LoggingConfig};
use openaero_io::output::{OutputFrame, MAX_OUTPUTS};
use openaero_io::pipeline::FlightIo;
use openaero_io::rc::{Axis, AxisMap, CenterCalibrator, Polarity, RcSnapshot, AXIS_COUNT};
use openaero_io::safety::ArmState;
use openaero_io::sim::{SimBoard, SimReceiver};
use openaero_io::telemetry::{DiagnosticsLogger, DiagnosticsRecord};

/// Configuration used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of output frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 500;

/// Logical axis driving each output channel
const OUTPUT_AXES: [Axis; MAX_OUTPUTS] = [
    Axis::Throttle,
    Axis::Roll,
    Axis::Pitch,
    Axis::Yaw,
    Axis::SecondAileron,
    Axis::Aux1,
    Axis::Aux2,
    Axis::Aux3,
];

const SERVO_CENTER_US: i32 = 1500;
const MOTOR_IDLE_US: i32 = 1000;

/// Receiver pulse widths used by the stick script
const STICK_CENTER_US: u16 = 1500;
const STICK_FULL_US: u16 = 2000;
const THROTTLE_IDLE_US: u16 = 1100;
const THROTTLE_CRUISE_US: u16 = 1400;

/// Roll sweep amplitude and length in receiver frames
const SWEEP_US: u16 = 300;
const SWEEP_FRAMES: u64 = 100;

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config_path: PathBuf,
    frames: Option<u64>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut config_path = None;
    let mut frames = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--frames" {
            let value = args.next().context("--frames needs a value")?;
            frames = Some(value.parse().with_context(|| format!("invalid frame count: {}", value))?);
        } else if arg.starts_with("--") {
            bail!("unknown option: {}", arg);
        } else if config_path.is_none() {
            config_path = Some(PathBuf::from(arg));
        } else {
            bail!("unexpected argument: {}", arg);
        }
    }

    Ok(Args {
        config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        frames,
    })
}

/// Console logging plus an optional daily-rolling file.
///
/// `RUST_LOG` overrides the configured level. The returned guard must stay
/// alive for file logs to be written.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            Ok(None)
        }
    }
}

/// Scripted stick positions, indexed by receiver frame.
struct StickScript {
    map: AxisMap,
    idle_frames: u64,
    arm_frames: u64,
}

impl StickScript {
    fn new(config: &Config) -> Self {
        let idle_frames = if config.rx.calibrate_on_start {
            u64::from(config.rx.center_frames) + 2
        } else {
            2
        };
        Self {
            map: config.axis_map(),
            idle_frames,
            arm_frames: u64::from(config.safety.arm_hold_frames) + 2,
        }
    }

    /// Physical receiver widths for one frame.
    fn widths(&self, rx_frame: u64) -> [u16; MAX_RC_CHANNELS] {
        let mut logical = [STICK_CENTER_US; AXIS_COUNT];
        logical[Axis::Throttle as usize] = THROTTLE_IDLE_US;

        if rx_frame >= self.idle_frames + self.arm_frames {
            let phase = (rx_frame - self.idle_frames - self.arm_frames) % SWEEP_FRAMES;
            let half = SWEEP_FRAMES / 2;
            let ramp = if phase < half { phase } else { SWEEP_FRAMES - phase };
            let offset = (ramp * u64::from(SWEEP_US) * 2 / half) as u16;
            logical[Axis::Roll as usize] = STICK_CENTER_US - SWEEP_US + offset;
            logical[Axis::Throttle as usize] = THROTTLE_CRUISE_US;
        } else if rx_frame >= self.idle_frames {
            logical[Axis::Yaw as usize] = STICK_FULL_US;
        }

        let mut widths = [STICK_CENTER_US; MAX_RC_CHANNELS];
        for axis in Axis::ALL {
            let Some(source) = self.map.source(axis) else {
                continue;
            };
            let Some(width) = widths.get_mut(source.channel) else {
                continue;
            };
            let us = logical[axis as usize];
            *width = match source.polarity {
                Polarity::Normal => us,
                Polarity::Reversed => 2 * STICK_CENTER_US - us,
            };
        }
        widths
    }
}

/// Pass-through mix: each output follows one logical axis.
fn mix(snapshot: &RcSnapshot, ticks_per_us: u16) -> OutputFrame {
    let ticks_per_us = i32::from(ticks_per_us.max(1));
    let mut frame = OutputFrame::default();
    for (channel, axis) in OUTPUT_AXES.iter().enumerate() {
        let base = if axis.is_unipolar() { MOTOR_IDLE_US } else { SERVO_CENTER_US };
        let us = base + i32::from(snapshot.get(*axis)) / ticks_per_us;
        frame.set(channel, us.clamp(0, i32::from(u16::MAX)) as u16);
    }
    frame
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load {}", args.config_path.display()))?;
    let _log_guard = init_logging(&config.logging)?;

    info!("OpenAero IO v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", args.config_path.display());

    let settings = config.flight_io_settings();
    let ticks_per_us = config.timebase().ticks_per_us();

    let state = Arc::new(RcInputState::new());
    let mut board = SimBoard::new(ticks_per_us);
    board.attach_input(config.capture(), Arc::clone(&state));
    let mut io = FlightIo::new(board, state, &settings);

    let receiver = SimReceiver::for_mode(config.input.mode, config.input.channel_count)
        .with_active_level(config.input.cppm_active_level);
    let script = StickScript::new(&config);
    let mut calibrator = config
        .rx
        .calibrate_on_start
        .then(|| CenterCalibrator::new(config.rx.center_frames));

    let mut logger = if config.diagnostics.enabled {
        Some(DiagnosticsLogger::new(
            &config.diagnostics.log_dir,
            config.diagnostics.max_records_per_file,
            config.diagnostics.max_files_to_keep,
        )?)
    } else {
        None
    };

    info!(
        "Input {:?}, {} channels; output {}Hz, mask {:#04x}",
        config.input.mode,
        config.input.channel_count,
        settings.timing.frame_rate_hz(),
        settings.timing.channel_mask
    );
    info!("Press Ctrl+C to exit");

    let frame_period_us = u64::from(settings.timing.frame_period_us);
    let rx_period_us = u64::from(receiver.frame_period_us());
    let mut ticker = interval(Duration::from_micros(frame_period_us));

    let mut next_rx_us: u64 = 0;
    let mut rx_frame: u64 = 0;
    let mut output_frames: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Queue receiver frames that start before the next output frame
                let horizon = io.hardware().time_us() + frame_period_us;
                while next_rx_us <= horizon {
                    let widths = script.widths(rx_frame);
                    let edges = receiver.frame_edges(next_rx_us, &widths[..config.input.channel_count]);
                    io.hardware_mut().schedule(edges);
                    next_rx_us += rx_period_us;
                    rx_frame += 1;
                }

                let snapshot = io.read_channels();

                if let Some(cal) = calibrator.as_mut() {
                    if snapshot.new_frame && cal.add_frame(&io.state().raw_widths()) {
                        if let Some(offsets) = cal.offsets() {
                            info!("Stick centers calibrated: {:?}", offsets);
                            io.set_zero_offsets(offsets);
                        }
                        calibrator = None;
                    }
                }

                io.emit_output(&mix(&snapshot, ticks_per_us));
                io.hardware_mut().take_pin_edges();
                output_frames += 1;

                if let Some(logger) = logger.as_mut() {
                    if output_frames % u64::from(config.diagnostics.log_interval_frames) == 0 {
                        let record = DiagnosticsRecord::new(output_frames, io.diagnostics(), &snapshot);
                        if let Err(e) = logger.log(&record) {
                            warn!("Failed to write diagnostics: {}", e);
                        }
                    }
                }

                if output_frames % LOG_INTERVAL_FRAMES == 0 {
                    let diag = io.diagnostics();
                    info!(
                        "{} output frames, state {}, {} overruns, {} jitter events",
                        diag.output_frames,
                        ArmState::from(io.flags()),
                        diag.overruns,
                        diag.jitter_events
                    );
                }

                if args.frames.is_some_and(|limit| output_frames >= limit) {
                    info!("Frame limit reached");
                    break;
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Some(logger) = logger.as_mut() {
        logger.flush()?;
    }

    let diag = io.diagnostics();
    info!(
        "Total: {} output frames, {} suppressed, {} receiver frames",
        diag.output_frames, diag.suppressed_frames, diag.rx_frames
    );

    Ok(())
}
