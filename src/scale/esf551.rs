use tracing::{debug, warn};

use super::model::{Reading, ReadingKey};
use super::state::{CommandKind, FrameOutcome, Measurement, OutboundCommand, UnitPreference};
use crate::codec::Esf551Codec;
use crate::hw::WriteMode;
use crate::protocol::WeightUnit;

/// Notification handling for ESF-551 scales.
///
/// Every measurement frame carries the unit the scale is displaying. A unit
/// correction is re-evaluated against that on every frame and at most one
/// correction write per requested unit is outstanding at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Esf551Protocol {
    in_flight: Option<WeightUnit>,
}

impl Esf551Protocol {
    pub fn handle_frame(&mut self, payload: &[u8], units: &mut UnitPreference) -> FrameOutcome {
        let Some(measurement) = Esf551Codec::decode(payload) else {
            return FrameOutcome::ignored();
        };

        let observed = match WeightUnit::try_from(measurement.display_unit()) {
            Ok(unit) => Some(unit),
            Err(error) => {
                warn!(%error, "scale reported an unknown display unit");
                None
            }
        };
        units.observe(observed);

        let mut outcome = FrameOutcome::ignored();
        match units.pending_correction() {
            Some(requested) if self.in_flight != Some(requested) => {
                debug!(%requested, ?observed, "display unit differs from request");
                self.in_flight = Some(requested);
                outcome = outcome.with_command(OutboundCommand::new(
                    CommandKind::UnitChange,
                    Esf551Codec::unit_change_command(requested),
                    WriteMode::WithoutResponse,
                ));
            }
            Some(_) => {}
            None => self.in_flight = None,
        }

        let display_unit = observed
            .or(units.requested())
            .unwrap_or(WeightUnit::Kg);
        let reading = Reading::with_weight(measurement.weight_kg())
            .with_impedance(measurement.impedance())
            .with(
                ReadingKey::DisplayUnit,
                f64::from(measurement.display_unit()),
            );

        outcome.with_measurement(Measurement::new(reading, display_unit))
    }

    pub fn command_failed(&mut self, kind: CommandKind) {
        if kind == CommandKind::UnitChange {
            self.in_flight = None;
        }
    }

    pub(crate) fn unit_change_sent(&mut self, unit: WeightUnit) {
        self.in_flight = Some(unit);
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
    }

    /// The unit carried by a unit-change write that has been issued and not
    /// yet confirmed by a matching frame.
    #[must_use]
    pub fn correction_in_flight(&self) -> Option<WeightUnit> {
        self.in_flight
    }
}
