use std::io;

use anyhow::Result;
use bon::Builder;
use clap::Args;
use serde::Serialize;

use crate::codec::{Esf24Codec, Esf24Frame, Esf551Codec};
use crate::error::FixtureError;
use crate::hw::HexPayload;
use crate::scale::ScaleModel;
use crate::terminal::TerminalClient;
use crate::utils::format_hex;

use super::command::OutputFormat;
use super::ui::{DecodeView, Painter};
use super::write_json;

/// Arguments for the `decode` command.
#[derive(Debug, Args, Builder)]
pub struct DecodeArgs {
    /// Scale model whose framing to apply.
    #[arg(long, default_value_t = ScaleModel::Esf551)]
    #[builder(default = ScaleModel::Esf551)]
    model: ScaleModel,
    /// Notification payload as hexadecimal bytes. Whitespace is ignored.
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    payload: HexPayload,
}

/// What a payload decodes to under one model's framing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub(crate) enum DecodedFrame {
    Measurement {
        weight_kg: f64,
        impedance: Option<u16>,
        display_unit: u8,
    },
    UnitQuery,
    MeasurementRequest,
    StableWeight {
        weight_kg: f64,
    },
    Unrecognised,
}

impl DecodedFrame {
    pub(crate) fn decode(model: ScaleModel, payload: &[u8]) -> Self {
        match model {
            ScaleModel::Esf551 => match Esf551Codec::decode(payload) {
                Some(measurement) => Self::Measurement {
                    weight_kg: measurement.weight_kg(),
                    impedance: measurement.impedance(),
                    display_unit: measurement.display_unit(),
                },
                None => Self::Unrecognised,
            },
            ScaleModel::Esf24 => match Esf24Codec::classify(payload) {
                Some(Esf24Frame::UnitQuery) => Self::UnitQuery,
                Some(Esf24Frame::MeasurementRequest) => Self::MeasurementRequest,
                Some(Esf24Frame::StableWeight { weight_kg }) => Self::StableWeight { weight_kg },
                None => Self::Unrecognised,
            },
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Measurement { .. } => "measurement",
            Self::UnitQuery => "unit_query",
            Self::MeasurementRequest => "measurement_request",
            Self::StableWeight { .. } => "stable_weight",
            Self::Unrecognised => "unrecognised",
        }
    }
}

/// JSON document written by `decode`.
#[derive(Debug, Serialize)]
struct DecodeReport<'a> {
    model: ScaleModel,
    payload: String,
    #[serde(flatten)]
    frame: &'a DecodedFrame,
}

/// Executes the `decode` command.
pub(crate) fn run<W>(
    args: DecodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let DecodeArgs { model, payload } = args;
    let payload: Vec<u8> = payload.into();
    let frame = DecodedFrame::decode(model, &payload);

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", DecodeView::new(model, &payload, &frame, &painter))?;
        }
        OutputFormat::Json => write_json(
            out,
            &DecodeReport {
                model,
                payload: format_hex(&payload),
                frame: &frame,
            },
        )?,
    }
    Ok(())
}
