use std::io;

use anyhow::Result;
use bon::Builder;
use clap::Args;

use crate::body_metrics::{BodyMetrics, MAX_HEIGHT_M, MIN_HEIGHT_M, Sex};
use crate::error::ConfigError;
use crate::scale::Reading;
use crate::terminal::TerminalClient;

use super::command::OutputFormat;
use super::ui::{Painter, ReadingView};
use super::write_json;

/// Arguments for the `metrics` command.
#[derive(Debug, Clone, Args, Builder)]
pub struct MetricsArgs {
    /// Body weight in kilograms.
    #[arg(long)]
    weight: f64,
    /// Height in metres.
    #[arg(long)]
    height: f64,
    /// Age in whole years.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=120))]
    age: u8,
    #[arg(long)]
    sex: Sex,
    /// Bioelectrical impedance in ohms. Without it only BMI and BMR are computed.
    #[arg(long)]
    impedance: Option<u16>,
}

impl MetricsArgs {
    fn reading(&self) -> Result<Reading, ConfigError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ConfigError::InvalidWeight { value: self.weight });
        }
        if !(MIN_HEIGHT_M..=MAX_HEIGHT_M).contains(&self.height) {
            return Err(ConfigError::InvalidHeight {
                value: self.height,
                min: MIN_HEIGHT_M,
                max: MAX_HEIGHT_M,
            });
        }

        let metrics = BodyMetrics::new(
            self.weight,
            self.height,
            self.age,
            self.sex,
            self.impedance.unwrap_or(0),
        );
        let reading = Reading::with_weight(self.weight).with_impedance(self.impedance);
        Ok(match self.impedance {
            Some(_) => reading.with_body_metrics(&metrics),
            None => reading.with_anthropometrics(&metrics),
        })
    }
}

/// Executes the `metrics` command.
pub(crate) fn run<W>(
    args: MetricsArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let reading = args.reading()?;
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", ReadingView::new(&reading, &painter))?;
        }
        OutputFormat::Json => write_json(out, &reading)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::scale::ReadingKey;

    fn args(weight: f64, height: f64, impedance: Option<u16>) -> MetricsArgs {
        MetricsArgs::builder()
            .weight(weight)
            .height(height)
            .age(30)
            .sex(Sex::Male)
            .maybe_impedance(impedance)
            .build()
    }

    #[test]
    fn impedance_unlocks_every_metric() -> Result<(), ConfigError> {
        let reading = args(75.0, 1.8, Some(500)).reading()?;
        assert_eq!(Some(75.0), reading.weight_kg());
        assert_eq!(Some(500), reading.impedance());
        for key in [
            ReadingKey::BodyFatPercentage,
            ReadingKey::BodyWaterPercentage,
            ReadingKey::MetabolicAge,
            ReadingKey::HealthScore,
        ] {
            assert!(reading.contains(key), "missing {key}");
        }
        Ok(())
    }

    #[test]
    fn without_impedance_only_bmi_and_bmr() -> Result<(), ConfigError> {
        let reading = args(75.0, 1.8, None).reading()?;
        let keys: Vec<_> = reading.iter().map(|(key, _)| key).collect();
        assert_eq!(
            vec![
                ReadingKey::Weight,
                ReadingKey::BodyMassIndex,
                ReadingKey::BasalMetabolicRate
            ],
            keys
        );
        Ok(())
    }

    #[rstest]
    #[case(0.0)]
    #[case(-3.0)]
    #[case(f64::NAN)]
    fn rejects_non_positive_weight(#[case] weight: f64) {
        assert_matches!(
            args(weight, 1.8, None).reading(),
            Err(ConfigError::InvalidWeight { .. })
        );
    }

    #[rstest]
    #[case(0.9)]
    #[case(2.3)]
    fn rejects_height_out_of_range(#[case] height: f64) {
        assert_matches!(
            args(75.0, height, None).reading(),
            Err(ConfigError::InvalidHeight { .. })
        );
    }

    #[test]
    fn json_output_is_a_flat_object() -> anyhow::Result<()> {
        struct Plain;
        impl TerminalClient for Plain {
            fn stdout_is_terminal(&self) -> bool {
                false
            }
            fn stderr_is_terminal(&self) -> bool {
                false
            }
        }

        let mut out = Vec::new();
        run(args(80.0, 2.0, None), &mut out, &Plain, OutputFormat::Json)?;
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(Some(80.0), value["weight"].as_f64());
        assert_eq!(Some(20.0), value["body_mass_index"].as_f64());
        Ok(())
    }
}
