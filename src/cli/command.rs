use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::cli::decode::DecodeArgs;
use crate::cli::listen::ListenArgs;
use crate::cli::metrics::MetricsArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{AdvertisementFixture, FakeTransport, NotificationPayloads};

/// Command-line options for the Etekcity scale tool.
#[derive(Debug, Parser)]
#[command(name = "esf", about = "Read weight and body composition from Etekcity BLE scales.")]
pub struct Args {
    /// Log verbosity. Overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format. Defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Uses the fake BLE transport with fixture-driven advertisements and notifications.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake advertisements in the form `address|name;...`. Use `-` for no name.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<AdvertisementFixture>,
    /// Notifications for the first fake connection, as comma-separated hex payloads.
    #[arg(long, global = true, requires = "fake")]
    fake_notifications: Option<NotificationPayloads>,
    /// Hardware revision string reported by the fake scale.
    #[arg(long, global = true, requires = "fake")]
    fake_hw_version: Option<String>,
    /// Software revision string reported by the fake scale.
    #[arg(long, global = true, requires = "fake")]
    fake_sw_version: Option<String>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use esf::{Args, Command, DecodeArgs, ScaleModel};
    ///
    /// let decode = DecodeArgs::builder()
    ///     .model(ScaleModel::Esf24)
    ///     .payload("10 0B 15 27 10 01 00 00 00 00 00")?
    ///     .build();
    /// let args = Args::new(Command::Decode(decode));
    /// let _ = args;
    /// # Ok::<(), esf::FixtureError>(())
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output: None,
            fake: false,
            fake_scan: None,
            fake_notifications: None,
            fake_hw_version: None,
            fake_sw_version: None,
            command,
        }
    }

    /// Enables fake transport mode with pre-parsed fixtures.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            scan_fixture,
            notifications,
            hw_version,
            sw_version,
        } = fake;

        self.fake = true;
        self.fake_scan = Some(scan_fixture);
        self.fake_notifications = notifications;
        self.fake_hw_version = hw_version;
        self.fake_sw_version = sw_version;
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Splits parsed arguments into the command and optional fake-transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if fake mode is enabled without an advertisement fixture.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_notifications,
            fake_hw_version,
            fake_sw_version,
            command,
            ..
        } = self;

        if !fake {
            return Ok((command, None));
        }
        let Some(scan_fixture) = fake_scan else {
            return Err(CliConfigError::MissingFakeScanFixture.into());
        };

        Ok((
            command,
            Some(FakeArgs {
                scan_fixture,
                notifications: fake_notifications,
                hw_version: fake_hw_version,
                sw_version: fake_sw_version,
            }),
        ))
    }
}

/// Fake transport fixtures for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: AdvertisementFixture,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    notifications: Option<NotificationPayloads>,
    #[builder(into)]
    hw_version: Option<String>,
    #[builder(into)]
    sw_version: Option<String>,
}

impl FakeArgs {
    pub(crate) fn into_transport(self) -> FakeTransport {
        let Self {
            scan_fixture,
            notifications,
            hw_version,
            sw_version,
        } = self;

        let transport =
            FakeTransport::new(scan_fixture.into()).with_versions(hw_version, sw_version);
        match notifications {
            Some(notifications) => transport.with_session(notifications.into()),
            None => transport,
        }
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan for one scale, connect when it advertises and print each stable measurement.
    Listen(ListenArgs),
    /// Decode one notification payload without touching the radio.
    Decode(DecodeArgs),
    /// Compute body-composition values for a weighing.
    Metrics(MetricsArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Listen(_) => "listen",
            Self::Decode(_) => "decode",
            Self::Metrics(_) => "metrics",
        }
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Rendering for command output.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Coloured tables for people.
    Pretty,
    /// One JSON document per line.
    Json,
}
