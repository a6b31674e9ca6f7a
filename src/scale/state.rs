use time::OffsetDateTime;

use strum_macros::Display;

use super::esf24::Esf24Protocol;
use super::esf551::Esf551Protocol;
use super::model::{Reading, ScaleModel};
use crate::hw::WriteMode;
use crate::protocol::WeightUnit;

/// Purpose of an outbound command frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CommandKind {
    UnitChange,
    UnitUpdate,
    MeasurementInit,
    EndMeasurement,
}

/// A command the session must write to the command characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    kind: CommandKind,
    payload: Vec<u8>,
    mode: WriteMode,
}

impl OutboundCommand {
    pub(crate) fn new(kind: CommandKind, payload: impl Into<Vec<u8>>, mode: WriteMode) -> Self {
        Self {
            kind,
            payload: payload.into(),
            mode,
        }
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn mode(&self) -> WriteMode {
        self.mode
    }
}

/// A decoded stable measurement, before session metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    reading: Reading,
    display_unit: WeightUnit,
}

impl Measurement {
    pub(crate) fn new(reading: Reading, display_unit: WeightUnit) -> Self {
        Self {
            reading,
            display_unit,
        }
    }

    #[must_use]
    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    #[must_use]
    pub fn display_unit(&self) -> WeightUnit {
        self.display_unit
    }

    pub(crate) fn into_parts(self) -> (Reading, WeightUnit) {
        (self.reading, self.display_unit)
    }
}

/// What one notification asks of the session.
///
/// Commands are listed in the order they must be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    commands: Vec<OutboundCommand>,
    measurement: Option<Measurement>,
}

impl FrameOutcome {
    pub(crate) fn ignored() -> Self {
        Self::default()
    }

    pub(crate) fn with_command(mut self, command: OutboundCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub(crate) fn with_measurement(mut self, measurement: Measurement) -> Self {
        self.measurement = Some(measurement);
        self
    }

    #[must_use]
    pub fn commands(&self) -> &[OutboundCommand] {
        &self.commands
    }

    #[must_use]
    pub fn measurement(&self) -> Option<&Measurement> {
        self.measurement.as_ref()
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.commands.is_empty() && self.measurement.is_none()
    }

    pub(crate) fn into_parts(self) -> (Vec<OutboundCommand>, Option<Measurement>) {
        (self.commands, self.measurement)
    }
}

/// Requested and observed display units for one scale.
///
/// `requested` is what the caller asked for. `observed` is what the scale last
/// reported, and is only ever set by scales that report their unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitPreference {
    requested: Option<WeightUnit>,
    observed: Option<WeightUnit>,
    correction_pending: bool,
}

impl UnitPreference {
    #[must_use]
    pub fn new(requested: Option<WeightUnit>) -> Self {
        Self {
            requested,
            observed: None,
            correction_pending: requested.is_some(),
        }
    }

    #[must_use]
    pub fn requested(&self) -> Option<WeightUnit> {
        self.requested
    }

    #[must_use]
    pub fn observed(&self) -> Option<WeightUnit> {
        self.observed
    }

    /// The unit callers should assume the scale is showing.
    #[must_use]
    pub fn effective(&self) -> Option<WeightUnit> {
        self.requested.or(self.observed)
    }

    #[must_use]
    pub fn is_correction_pending(&self) -> bool {
        self.correction_pending
    }

    /// Returns the unit to push to the scale, if one is pending.
    #[must_use]
    pub fn pending_correction(&self) -> Option<WeightUnit> {
        self.requested.filter(|_| self.correction_pending)
    }

    pub(crate) fn request(&mut self, unit: Option<WeightUnit>) {
        self.requested = unit;
        self.correction_pending = unit.is_some();
    }

    pub(crate) fn rearm(&mut self) {
        self.correction_pending = self.requested.is_some();
    }

    pub(crate) fn correction_delivered(&mut self) {
        self.correction_pending = false;
    }

    /// Records what the scale displays and recomputes whether it disagrees
    /// with the request.
    pub(crate) fn observe(&mut self, observed: Option<WeightUnit>) {
        if observed.is_some() {
            self.observed = observed;
        }
        self.correction_pending = match self.requested {
            Some(requested) => self.observed != Some(requested),
            None => false,
        };
    }
}

/// Per-model protocol state, dispatched by model.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleProtocol {
    Esf551(Esf551Protocol),
    Esf24(Esf24Protocol),
}

impl ScaleProtocol {
    #[must_use]
    pub fn for_model(model: ScaleModel) -> Self {
        match model {
            ScaleModel::Esf551 => Self::Esf551(Esf551Protocol::default()),
            ScaleModel::Esf24 => Self::Esf24(Esf24Protocol::default()),
        }
    }

    #[must_use]
    pub fn model(&self) -> ScaleModel {
        match self {
            Self::Esf551(_) => ScaleModel::Esf551,
            Self::Esf24(_) => ScaleModel::Esf24,
        }
    }

    /// Feeds one notification through the model's state machine.
    pub fn handle_frame(
        &mut self,
        payload: &[u8],
        units: &mut UnitPreference,
        now: OffsetDateTime,
    ) -> FrameOutcome {
        match self {
            Self::Esf551(protocol) => protocol.handle_frame(payload, units),
            Self::Esf24(protocol) => protocol.handle_frame(payload, units, now),
        }
    }

    /// Records that a command produced by this state machine failed to write.
    pub fn command_failed(&mut self, kind: CommandKind) {
        match self {
            Self::Esf551(protocol) => protocol.command_failed(kind),
            Self::Esf24(protocol) => protocol.command_failed(kind),
        }
    }

    /// Records a unit change written outside the notification path.
    pub(crate) fn unit_change_sent(&mut self, unit: WeightUnit) {
        if let Self::Esf551(protocol) = self {
            protocol.unit_change_sent(unit);
        }
    }

    /// Returns to the state expected at the start of a connection.
    pub fn reset(&mut self) {
        match self {
            Self::Esf551(protocol) => protocol.reset(),
            Self::Esf24(protocol) => protocol.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn new_preference_with_request_is_pending() {
        let units = UnitPreference::new(Some(WeightUnit::Lb));
        assert_eq!(Some(WeightUnit::Lb), units.pending_correction());
        assert_eq!(None, UnitPreference::new(None).pending_correction());
    }

    #[rstest]
    #[case(Some(WeightUnit::Kg), Some(WeightUnit::Kg), false)]
    #[case(Some(WeightUnit::Kg), Some(WeightUnit::St), true)]
    #[case(None, Some(WeightUnit::St), false)]
    #[case(Some(WeightUnit::Lb), None, true)]
    fn observe_recomputes_pending_from_scratch(
        #[case] requested: Option<WeightUnit>,
        #[case] observed: Option<WeightUnit>,
        #[case] pending: bool,
    ) {
        let mut units = UnitPreference::new(requested);
        units.correction_delivered();
        units.observe(observed);
        assert_eq!(pending, units.is_correction_pending());
    }

    #[test]
    fn effective_unit_prefers_request_over_observation() {
        let mut units = UnitPreference::new(None);
        units.observe(Some(WeightUnit::St));
        assert_eq!(Some(WeightUnit::St), units.effective());
        assert_eq!(None, units.requested());

        units.request(Some(WeightUnit::Lb));
        assert_eq!(Some(WeightUnit::Lb), units.effective());
        assert_eq!(Some(WeightUnit::St), units.observed());
    }

    #[test]
    fn protocol_reports_its_model() {
        assert_eq!(
            ScaleModel::Esf24,
            ScaleProtocol::for_model(ScaleModel::Esf24).model()
        );
        assert_eq!(
            ScaleModel::Esf551,
            ScaleProtocol::for_model(ScaleModel::Esf551).model()
        );
    }
}
