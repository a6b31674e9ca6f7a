use std::fmt::{self, Display, Formatter};

use crate::cli::decode::DecodedFrame;
use crate::protocol::WeightUnit;
use crate::scale::ScaleModel;
use crate::utils::{format_hex, format_value};

use super::painter::{Painter, Tone};
use super::table::FieldTable;

/// Renders the outcome of decoding one payload offline.
pub(crate) struct DecodeView<'a> {
    model: ScaleModel,
    payload: &'a [u8],
    frame: &'a DecodedFrame,
    painter: &'a Painter,
}

impl<'a> DecodeView<'a> {
    pub(crate) fn new(
        model: ScaleModel,
        payload: &'a [u8],
        frame: &'a DecodedFrame,
        painter: &'a Painter,
    ) -> Self {
        Self {
            model,
            payload,
            frame,
            painter,
        }
    }
}

fn unit_label(raw: u8) -> String {
    WeightUnit::try_from(raw).map_or_else(|_| format!("unknown ({raw})"), |unit| unit.to_string())
}

impl Display for DecodeView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        let frame_tone = match self.frame {
            DecodedFrame::Unrecognised => Tone::Caution,
            _ => Tone::Good,
        };

        let table = FieldTable::new()
            .row(painter, "model", painter.value(self.model))
            .row(painter, "payload", painter.value(format_hex(self.payload)))
            .row(painter, "frame", painter.paint(frame_tone, self.frame.label()));
        let table = match self.frame {
            DecodedFrame::Measurement {
                weight_kg,
                impedance,
                display_unit,
            } => {
                let impedance =
                    impedance.map_or_else(|| "-".to_string(), |ohm| format!("{ohm} Ω"));
                table
                    .row(
                        painter,
                        "weight",
                        painter.value(format!("{} kg", format_value(*weight_kg))),
                    )
                    .row(painter, "impedance", painter.value(impedance))
                    .row(painter, "display_unit", painter.value(unit_label(*display_unit)))
            }
            DecodedFrame::StableWeight { weight_kg } => table.row(
                painter,
                "weight",
                painter.value(format!("{} kg", format_value(*weight_kg))),
            ),
            DecodedFrame::UnitQuery
            | DecodedFrame::MeasurementRequest
            | DecodedFrame::Unrecognised => table,
        };

        writeln!(f, "{}", painter.heading("Decoded frame:"))?;
        write!(f, "{table}")
    }
}
