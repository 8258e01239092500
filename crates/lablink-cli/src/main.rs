//! Acquisition scripts for the imaging instrument.
//!
//! Each subcommand is a short sequential call list over the driver facade:
//! `capture` runs the full wait/capture/wait sequence, `wait-sphere` blocks
//! until the sphere is safe to approach, `check` probes the last-image
//! status, and `simulate` runs the instrument-side responder on a port so
//! the driver can be tested against a pty pair.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lablink_core::protocol::{ConnectionConfig, Device, SerialTransport, Simulator};

#[derive(Parser)]
#[command(name = "lablink", version, about = "Serial driver for laboratory imaging instruments")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Serial port the instrument is attached to
    #[arg(short, long)]
    port: String,

    /// Rounds of connection handshake before giving up
    #[arg(long, default_value_t = 3)]
    init_retries: u32,

    /// Seconds to wait between failed handshake rounds
    #[arg(long, default_value_t = 5)]
    init_retry_delay: u64,

    /// Attempts per command before giving up
    #[arg(long, default_value_t = 3)]
    command_attempts: u32,

    /// Also require the ReadyForNextSample handshake during initialization
    #[arg(long)]
    require_ready_probe: bool,

    /// Expect a chained AnalysisDone line after CaptureOK
    #[arg(long)]
    chained_analysis_confirmation: bool,
}

impl ConnectionArgs {
    fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            port_name: self.port.clone(),
            init_retries: self.init_retries,
            init_retry_delay: std::time::Duration::from_secs(self.init_retry_delay),
            command_max_attempts: self.command_attempts,
            require_ready_probe: self.require_ready_probe,
            chained_analysis_confirmation: self.chained_analysis_confirmation,
            ..ConnectionConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the previous analysis, capture an image, wait for the sphere
    Capture {
        /// Sample identifier; defaults to a timestamp
        #[arg(long)]
        sample_id: Option<String>,

        /// Operator initials
        #[arg(long, default_value = "")]
        initials: String,

        /// Free-form comments stored with the image
        #[arg(long, default_value = "")]
        comments: String,

        /// Do not suffix the stored image name with a timestamp
        #[arg(long)]
        no_timestamp_suffix: bool,

        /// Seconds to wait for the previous analysis to complete
        #[arg(long, default_value_t = 5)]
        analysis_timeout: u64,

        /// Seconds to wait for the capture acknowledgement
        #[arg(long, default_value_t = 15)]
        capture_timeout: u64,

        /// Seconds to wait for the sphere to move up after the capture
        #[arg(long, default_value_t = 10)]
        sphere_timeout: u64,
    },

    /// Wait until the sphere has moved up.
    ///
    /// Use this before having a robot present the first sample under the
    /// sphere.
    WaitSphere {
        /// Seconds to wait for the sphere
        #[arg(long, default_value_t = 15)]
        timeout: u64,
    },

    /// Initialize and check whether the last image failed
    Check,

    /// Run an instrument simulator on the port
    Simulate,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.connection.to_config();

    match cli.command {
        Commands::Capture {
            sample_id,
            initials,
            comments,
            no_timestamp_suffix,
            analysis_timeout,
            capture_timeout,
            sphere_timeout,
        } => {
            let sample_id = sample_id
                .unwrap_or_else(|| Local::now().format("sample-%Y%m%d-%H%M%S").to_string());

            let mut device = initialized_device(config)?;
            device
                .wait_for_analysis_complete(analysis_timeout)
                .context("Waiting for the previous analysis to complete")?;
            device
                .capture_image(
                    &sample_id,
                    &initials,
                    &comments,
                    !no_timestamp_suffix,
                    capture_timeout,
                )
                .with_context(|| format!("Capturing image for sample {sample_id}"))?;
            device
                .wait_for_sphere_up(sphere_timeout)
                .context("Waiting for the sphere to move up")?;
            info!(sample_id = sample_id.as_str(), "capture done and sphere is up");
        }

        Commands::WaitSphere { timeout } => {
            let mut device = initialized_device(config)?;
            device
                .wait_for_sphere_up(timeout)
                .context("Waiting for the sphere to move up")?;
            info!("sphere is up");
        }

        Commands::Check => {
            let mut device = initialized_device(config)?;
            device
                .check_if_last_image_failed()
                .context("Checking the last image status")?;
            info!("last image did not fail");
        }

        Commands::Simulate => {
            let mut transport = SerialTransport::open(&config)
                .with_context(|| format!("Opening simulator port {}", config.port_name))?;
            info!(port = config.port_name.as_str(), "instrument simulator listening");
            Simulator::new().serve(&mut transport)?;
        }
    }

    Ok(())
}

fn initialized_device(config: ConnectionConfig) -> Result<Device> {
    let port = config.port_name.clone();
    let mut device = Device::new(config);
    device
        .initialize()
        .with_context(|| format!("Initializing the instrument on {port}"))?;
    Ok(device)
}
