use crate::modem::engine::EngineConfig;
use crate::modem::reader::FrameReader;
use crate::modem::setup::DEFAULT_BOOT_WAIT;
use crate::tracker::upload::UploadConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

// CLI root definition. This is the single entrypoint for all supported modes.
#[derive(Parser, Debug)]
#[command(name = "gps-modem-tracker", version)]
#[command(about = "GPS tracker relaying position changes through an AT-command cellular modem")]
pub struct Cli {
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,
    #[command(subcommand)]
    pub command: AppCommand,
}

// Subcommands map directly to one module each under src/commands/.
#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Bring the modem up, then track GPS and upload every position change
    Track(TrackArgs),
    /// Run raw AT exchanges against the modem and print what comes back
    Send(SendArgs),
    /// Decode the GPS stream and log change evaluations without uploading
    Gps(GpsArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Scratch buffer shape shared by the modem and GPS read paths.
#[derive(Args, Debug, Clone)]
pub struct FrameArgs {
    #[arg(long, default_value_t = 4_097)]
    pub frame_bytes: usize,
    #[arg(long, default_value_t = 2)]
    pub settle_ms: u64,
    #[arg(long, default_value_t = 50)]
    pub read_timeout_ms: u64,
}

impl FrameArgs {
    pub fn reader(&self) -> FrameReader {
        FrameReader::new(self.frame_bytes, Duration::from_millis(self.settle_ms))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ModemArgs {
    #[arg(long, default_value = "/dev/ttyUSB2")]
    pub modem_port: String,
    #[arg(long, default_value_t = 115_200)]
    pub modem_baud: u32,
    #[arg(long, default_value_t = 4_000)]
    pub command_timeout_ms: u64,
    #[arg(long, default_value_t = 1)]
    pub poll_ms: u64,
    /// Ceiling for fill-wait exchanges; unbounded when not given
    #[arg(long)]
    pub fill_ceiling_ms: Option<u64>,
    /// Serial port mirroring the modem echo; stdout when not given
    #[arg(long)]
    pub console_port: Option<String>,
    #[arg(long, default_value_t = 115_200)]
    pub console_baud: u32,
    #[arg(long, default_value = ".")]
    pub lock_dir: PathBuf,
}

impl ModemArgs {
    pub fn engine_config(&self, frame: &FrameArgs) -> EngineConfig {
        EngineConfig {
            frame_capacity: frame.frame_bytes,
            settle: Duration::from_millis(frame.settle_ms),
            poll_interval: Duration::from_millis(self.poll_ms),
            fill_ceiling: self.fill_ceiling_ms.map(Duration::from_millis),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct GpsPortArgs {
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub gps_port: String,
    #[arg(long, default_value_t = 9_600)]
    pub gps_baud: u32,
    /// Minimum time between two processed GPS frames
    #[arg(long, default_value_t = 10)]
    pub gps_interval_secs: u64,
    /// Idle sleep of the control loop when nothing is due
    #[arg(long, default_value_t = 5)]
    pub idle_ms: u64,
}

impl GpsPortArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.gps_interval_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

// Full tracker configuration.
#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
    #[command(flatten)]
    pub modem: ModemArgs,
    #[command(flatten)]
    pub gps: GpsPortArgs,
    /// Endpoint the modem PUTs positions to
    #[arg(long, env = "TRACKER_CLOUD_URL")]
    pub cloud_url: String,
    #[arg(long, default_value_t = DEFAULT_BOOT_WAIT.as_secs())]
    pub boot_wait_secs: u64,
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub http_bind: String,
    #[arg(long, default_value_t = 5)]
    pub restart_delay_secs: u64,
    #[arg(long, default_value_t = 30)]
    pub put_input_timeout_secs: u16,
    #[arg(long, default_value_t = 60)]
    pub put_response_timeout_secs: u16,
}

impl TrackArgs {
    pub fn boot_wait(&self) -> Duration {
        Duration::from_secs(self.boot_wait_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            input_timeout_secs: self.put_input_timeout_secs,
            response_timeout_secs: self.put_response_timeout_secs,
            command_timeout: self.modem.command_timeout(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
    #[command(flatten)]
    pub modem: ModemArgs,
    /// Keep listening past the timeout (until --fill-ceiling-ms, if any)
    #[arg(long, default_value_t = false)]
    pub fill: bool,
    /// Command lines, sent in order, e.g. `AT+CSQ`
    #[arg(required = true)]
    pub commands: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GpsArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
    #[command(flatten)]
    pub gps: GpsPortArgs,
}
