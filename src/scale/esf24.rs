use time::OffsetDateTime;
use tracing::{debug, trace};

use super::model::Reading;
use super::state::{CommandKind, FrameOutcome, Measurement, OutboundCommand, UnitPreference};
use crate::codec::{Esf24Codec, Esf24Frame};
use crate::hw::WriteMode;
use crate::protocol::WeightUnit;

/// Steps of the ESF-24 handshake that are answered once per connection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HandshakeStep {
    UnitSent,
    MeasurementInitiated,
}

/// Which handshake steps have been answered on the current connection.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct HandshakeFlags {
    unit_sent: bool,
    measurement_initiated: bool,
}

impl HandshakeFlags {
    #[must_use]
    pub fn contains(self, step: HandshakeStep) -> bool {
        match step {
            HandshakeStep::UnitSent => self.unit_sent,
            HandshakeStep::MeasurementInitiated => self.measurement_initiated,
        }
    }

    /// Sets `step`, returning `true` if it was not already set.
    fn latch(&mut self, step: HandshakeStep) -> bool {
        let flag = match step {
            HandshakeStep::UnitSent => &mut self.unit_sent,
            HandshakeStep::MeasurementInitiated => &mut self.measurement_initiated,
        };
        !std::mem::replace(flag, true)
    }
}

/// Notification handling for ESF-24 scales.
///
/// The scale drives a unit query, then a measurement request, then a stable
/// weight. The first two are answered once per connection. Every stable
/// weight is acknowledged, including repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Esf24Protocol {
    flags: HandshakeFlags,
}

impl Esf24Protocol {
    pub fn handle_frame(
        &mut self,
        payload: &[u8],
        units: &UnitPreference,
        now: OffsetDateTime,
    ) -> FrameOutcome {
        let display_unit = units.requested().unwrap_or(WeightUnit::Kg);

        match Esf24Codec::classify(payload) {
            Some(Esf24Frame::UnitQuery) => {
                if !self.flags.latch(HandshakeStep::UnitSent) {
                    trace!("unit query already answered on this connection");
                    return FrameOutcome::ignored();
                }
                debug!(unit = %display_unit, "answering unit query");
                FrameOutcome::ignored().with_command(OutboundCommand::new(
                    CommandKind::UnitUpdate,
                    Esf24Codec::unit_update_command(display_unit),
                    WriteMode::WithResponse,
                ))
            }
            Some(Esf24Frame::MeasurementRequest) => {
                if !self.flags.latch(HandshakeStep::MeasurementInitiated) {
                    trace!("measurement already initiated on this connection");
                    return FrameOutcome::ignored();
                }
                debug!("initiating measurement");
                FrameOutcome::ignored().with_command(OutboundCommand::new(
                    CommandKind::MeasurementInit,
                    Esf24Codec::measurement_init_command(now),
                    WriteMode::WithResponse,
                ))
            }
            Some(Esf24Frame::StableWeight { weight_kg }) => {
                debug!(weight_kg, "stable weight received");
                FrameOutcome::ignored()
                    .with_command(OutboundCommand::new(
                        CommandKind::EndMeasurement,
                        Esf24Codec::end_measurement_command(),
                        WriteMode::WithResponse,
                    ))
                    .with_measurement(Measurement::new(
                        Reading::with_weight(weight_kg),
                        display_unit,
                    ))
            }
            None => FrameOutcome::ignored(),
        }
    }

    /// Any failed write restarts the handshake from the unit query.
    pub fn command_failed(&mut self, kind: CommandKind) {
        debug!(%kind, "clearing handshake after failed write");
        self.flags = HandshakeFlags::default();
    }

    pub fn reset(&mut self) {
        self.flags = HandshakeFlags::default();
    }

    #[must_use]
    pub fn flags(&self) -> HandshakeFlags {
        self.flags
    }
}
