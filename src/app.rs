use std::io;
use std::sync::Arc;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::error::InteractionError;
use crate::hw::{BtleplugTransport, ScaleTransport};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Which BLE transport a command runs against.
#[derive(Debug)]
pub enum TransportBackend {
    /// The system Bluetooth stack via `btleplug`.
    Real,
    /// The fixture-driven fake transport.
    Fake(FakeArgs),
}

impl TransportBackend {
    /// Picks the fake backend when fake settings are present.
    #[must_use]
    pub fn from_fake_args(fake_args: Option<FakeArgs>) -> Self {
        fake_args.map_or(Self::Real, Self::Fake)
    }
}

/// Opens the transport for `backend`.
///
/// # Errors
///
/// Returns an error if no matching Bluetooth adapter is available.
#[instrument(skip(backend), level = "info", fields(adapter = ?adapter))]
async fn open_transport(
    backend: TransportBackend,
    adapter: Option<&str>,
) -> Result<Arc<dyn ScaleTransport>, InteractionError> {
    match backend {
        TransportBackend::Fake(fake_args) => Ok(Arc::new(fake_args.into_transport())),
        TransportBackend::Real => {
            tracing::Span::current().pb_set_message("Opening Bluetooth adapter");
            match BtleplugTransport::new(adapter).await {
                Ok(transport) => {
                    tracing::Span::current()
                        .pb_set_finish_message(&format!("{} Adapter ready", "✓".green()));
                    Ok(Arc::new(transport))
                }
                Err(error) => {
                    tracing::Span::current()
                        .pb_set_finish_message(&format!("{} No adapter", "✗".red()));
                    Err(error)
                }
            }
        }
    }
}

/// Runs `command` with pretty output and the log level taken from `RUST_LOG`.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = esf::Args::try_parse_from([
///     "esf",
///     "decode",
///     "--model",
///     "esf24",
///     "10 0B 15 1C 52 01 00 00 00 00 00",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let backend = esf::TransportBackend::from_fake_args(maybe_fake_args);
/// let mut out = Vec::new();
/// esf::run(command, &mut out, backend).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Fails when logging cannot be set up, the command's arguments are invalid,
/// the adapter cannot be opened, or `out` rejects a write.
pub async fn run<W>(command: Command, out: &mut W, backend: TransportBackend) -> Result<()>
where
    W: io::Write,
{
    run_with_log_level(command, out, backend, None, OutputFormat::Pretty).await
}

/// Runs the CLI command with an explicit log level and output format.
///
/// # Errors
///
/// Fails for the same reasons as [`run`].
pub async fn run_with_log_level<W>(
    command: Command,
    out: &mut W,
    backend: TransportBackend,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(
        command,
        out,
        &SystemTerminalClient,
        backend,
        log_level,
        output_format,
    )
    .await
}

/// Runs the CLI command with injected clients.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl esf::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = esf::Args::try_parse_from([
///     "esf",
///     "--fake",
///     "--fake-scan",
///     "AA:BB:CC:DD:EE:FF|Etekcity Fitness Scale",
///     "--fake-notifications",
///     "A5 02 00 10 00 00 01 61 A1 00 E8 03 00 64 00 00 00 00 00 01 01 00",
///     "listen",
///     "--address",
///     "AA:BB:CC:DD:EE:FF",
///     "--max-results",
///     "1",
/// ])?;
/// let log_level = args.log_level();
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let mut out = Vec::new();
/// esf::run_with_clients(
///     command,
///     &mut out,
///     &FakeTerminal,
///     esf::TransportBackend::from_fake_args(maybe_fake_args),
///     log_level,
///     esf::OutputFormat::Json,
/// ).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Fails for the same reasons as [`run`]. Transport faults after the scale
/// connects are logged rather than returned.
#[instrument(
    skip(out, terminal_client, backend),
    level = "info",
    fields(command = %command.name(), ?log_level, ?output_format)
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    backend: TransportBackend,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "esf",
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    match command {
        Command::Listen(args) => {
            let transport = open_transport(backend, args.adapter()).await?;
            crate::cli::listen::run(transport, args, out, terminal_client, output_format).await
        }
        Command::Decode(args) => crate::cli::decode::run(args, out, terminal_client, output_format),
        Command::Metrics(args) => {
            crate::cli::metrics::run(args, out, terminal_client, output_format)
        }
    }
}
