use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bon::Builder;
use clap::Args;
use time::Date;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::body_metrics::{BodyProfile, Sex, parse_birthdate};
use crate::error::{CliConfigError, InteractionError};
use crate::hw::ScaleTransport;
use crate::protocol::WeightUnit;
use crate::scale::{Scale, ScaleConfig, ScaleModel, ScaleResult, ScanMode};
use crate::terminal::TerminalClient;

use super::command::OutputFormat;
use super::ui::{ListenStartView, ListenSummaryView, Painter, ResultView};
use super::write_json;

/// Arguments for the `listen` command.
#[derive(Debug, Clone, Args, Builder)]
pub struct ListenArgs {
    /// Hardware address of the scale, e.g. `AA:BB:CC:DD:EE:FF`.
    #[arg(long)]
    #[builder(into)]
    address: String,
    /// Scale model.
    #[arg(long, default_value_t = ScaleModel::Esf551)]
    #[builder(default = ScaleModel::Esf551)]
    model: ScaleModel,
    /// Unit to show on the scale display (`kg`, `lb` or `st`).
    #[arg(long)]
    unit: Option<WeightUnit>,
    /// Scan mode requested from the adapter.
    #[arg(long, default_value_t = ScanMode::Active)]
    #[builder(default)]
    scan_mode: ScanMode,
    /// Bluetooth adapter name hint, e.g. `hci1`.
    #[arg(long)]
    #[builder(into)]
    adapter: Option<String>,
    /// Sex used for body-composition values.
    #[arg(long, requires_all = ["birthdate", "height"])]
    sex: Option<Sex>,
    /// Birthdate used for body-composition values (`YYYY-MM-DD`).
    #[arg(long, requires_all = ["sex", "height"], value_parser = parse_birthdate)]
    birthdate: Option<Date>,
    /// Height in metres used for body-composition values.
    #[arg(long, requires_all = ["sex", "birthdate"])]
    height: Option<f64>,
    /// Stop after this many measurements. If omitted, listen until Ctrl+C.
    #[arg(long)]
    max_results: Option<usize>,
    /// Stop after this much time, e.g. `90s` or `5m`.
    #[arg(long, value_parser = parse_duration)]
    listen_for: Option<Duration>,
}

impl ListenArgs {
    /// Builds the body profile from `--sex`, `--birthdate` and `--height`.
    fn body_profile(&self) -> Result<Option<BodyProfile>> {
        match (self.sex, self.birthdate, self.height) {
            (None, None, None) => Ok(None),
            (Some(sex), Some(birthdate), Some(height)) => {
                Ok(Some(BodyProfile::new(sex, birthdate, height)?))
            }
            _ => Err(CliConfigError::IncompleteBodyProfile.into()),
        }
    }

    pub(crate) fn scale_config(&self) -> Result<ScaleConfig> {
        Ok(ScaleConfig::builder()
            .address(self.address.as_str())
            .model(self.model)
            .maybe_display_unit(self.unit)
            .scan_mode(self.scan_mode)
            .maybe_adapter(self.adapter.clone())
            .maybe_body_profile(self.body_profile()?)
            .build())
    }

    pub(crate) fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

/// Why a listen run ended.
#[derive(Debug, Clone, Eq, PartialEq, derive_more::Display)]
pub(crate) enum ListenStopReason {
    #[display("reached limit of {_0}")]
    ReachedLimit(usize),
    #[display("listen time elapsed")]
    TimedOut,
    #[display("interrupted")]
    Interrupted,
}

/// Executes the `listen` command.
#[instrument(skip_all, level = "info", fields(address = %args.address, model = %args.model))]
pub(crate) async fn run<W>(
    transport: Arc<dyn ScaleTransport>,
    args: ListenArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let painter = Painter::new(terminal_client.stdout_is_terminal());
    let config = args.scale_config()?;
    if output_format == OutputFormat::Pretty {
        writeln!(out, "{}", ListenStartView::new(&config, &painter))?;
    }

    let (sender, mut results) = mpsc::unbounded_channel::<ScaleResult>();
    let scale = Scale::new(config, transport, move |result| {
        if sender.send(result).is_err() {
            warn!("listener gone, dropping measurement");
        }
    });
    scale.start().await?;

    let deadline = args.listen_for.map(|duration| tokio::time::Instant::now() + duration);
    let mut received = 0_usize;
    let outcome: Result<ListenStopReason> = loop {
        if let Some(limit) = args.max_results.filter(|limit| received >= *limit) {
            break Ok(ListenStopReason::ReachedLimit(limit));
        }

        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal
                    .map(|()| ListenStopReason::Interrupted)
                    .map_err(|source| InteractionError::CtrlC { source }.into());
            }
            () = sleep_until(deadline) => break Ok(ListenStopReason::TimedOut),
            maybe_result = results.recv() => {
                let Some(result) = maybe_result else {
                    break Ok(ListenStopReason::Interrupted);
                };
                received += 1;
                info!(received, weight_kg = ?result.reading().weight_kg(), "measurement received");
                if let Err(error) = write_result(out, received, &result, &painter, output_format) {
                    break Err(error);
                }
            }
        }
    };

    if let Err(error) = scale.stop().await {
        warn!(?error, "failed to stop scanning cleanly");
    }
    if let Err(error) = scale.disconnect().await {
        warn!(?error, "failed to disconnect cleanly");
    }

    let stop_reason = outcome?;
    if output_format == OutputFormat::Pretty {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            ListenSummaryView::new(received, &stop_reason, &painter)
        )?;
    }
    Ok(())
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn write_result<W>(
    out: &mut W,
    index: usize,
    result: &ScaleResult,
    painter: &Painter,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    match output_format {
        OutputFormat::Pretty => writeln!(out, "{}", ResultView::new(index, result, painter))?,
        OutputFormat::Json => write_json(out, result)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::Parser;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use time::macros::date;

    use super::*;
    use crate::cli::{Args, Command};

    fn listen_args(extra: &[&str]) -> anyhow::Result<ListenArgs> {
        let argv = ["esf", "listen", "--address", "AA:BB:CC:DD:EE:FF"]
            .into_iter()
            .chain(extra.iter().copied());
        let (command, _) = Args::try_parse_from(argv)?.into_command_and_fake_args()?;
        match command {
            Command::Listen(args) => Ok(args),
            other => anyhow::bail!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn defaults_to_esf551_active_scan() -> anyhow::Result<()> {
        let config = listen_args(&[])?.scale_config()?;
        assert_eq!(ScaleModel::Esf551, config.model());
        assert_eq!(ScanMode::Active, config.scan_mode());
        assert_eq!(None, config.display_unit());
        assert_eq!(None, config.body_profile());
        Ok(())
    }

    #[test]
    fn body_profile_flags_build_a_profile() -> anyhow::Result<()> {
        let args = listen_args(&[
            "--model",
            "esf24",
            "--unit",
            "LB",
            "--sex",
            "female",
            "--birthdate",
            "1990-03-14",
            "--height",
            "1.65",
            "--listen-for",
            "90s",
        ])?;
        assert_eq!(Some(Duration::from_secs(90)), args.listen_for);

        let config = args.scale_config()?;
        assert_eq!(ScaleModel::Esf24, config.model());
        assert_eq!(Some(WeightUnit::Lb), config.display_unit());
        let profile = config.body_profile().expect("profile from flags");
        assert_eq!(Sex::Female, profile.sex());
        assert_eq!(date!(1990 - 03 - 14), profile.birthdate());
        Ok(())
    }

    #[test]
    fn partial_body_profile_is_rejected_by_parser() {
        let error = listen_args(&["--sex", "male"]).expect_err("birthdate and height required");
        let error = error.downcast::<clap::Error>().expect("clap error");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn out_of_range_height_fails_config() -> anyhow::Result<()> {
        let args = listen_args(&["--sex", "male", "--birthdate", "1980-01-01", "--height", "2.5"])?;
        let error = args.scale_config().expect_err("height outside range");
        assert_matches!(
            error.downcast_ref::<crate::error::ConfigError>(),
            Some(crate::error::ConfigError::InvalidHeight { .. })
        );
        Ok(())
    }

    #[test]
    fn builder_without_profile_fields_has_no_profile() -> anyhow::Result<()> {
        let args = ListenArgs::builder()
            .address("AA:BB:CC:DD:EE:FF")
            .max_results(1)
            .build();
        assert_eq!(None, args.body_profile()?);
        assert_eq!(None, args.adapter());
        Ok(())
    }

    #[test]
    fn builder_with_partial_profile_is_incomplete() {
        let args = ListenArgs::builder()
            .address("AA:BB:CC:DD:EE:FF")
            .sex(Sex::Male)
            .build();
        let error = args.body_profile().expect_err("partial profile");
        assert_matches!(
            error.downcast_ref::<CliConfigError>(),
            Some(CliConfigError::IncompleteBodyProfile)
        );
    }
}
