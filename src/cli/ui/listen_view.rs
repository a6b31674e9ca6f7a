use std::fmt::{self, Display, Formatter};

use crate::cli::listen::ListenStopReason;
use crate::scale::ScaleConfig;
use crate::utils::or_dash;

use super::painter::{Painter, Tone};
use super::table::FieldTable;

/// Renders the session settings before scanning starts.
pub(crate) struct ListenStartView<'a> {
    config: &'a ScaleConfig,
    painter: &'a Painter,
}

impl<'a> ListenStartView<'a> {
    pub(crate) fn new(config: &'a ScaleConfig, painter: &'a Painter) -> Self {
        Self { config, painter }
    }
}

impl Display for ListenStartView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        let config = self.config;
        let unit = config
            .display_unit()
            .map_or_else(|| "as shown on scale".to_string(), |unit| unit.to_string());
        let profile = match config.body_profile() {
            Some(profile) => format!(
                "{}, born {}, {} m",
                profile.sex(),
                profile.birthdate(),
                profile.height_m()
            ),
            None => "-".to_string(),
        };

        let table = FieldTable::new()
            .row(painter, "address", painter.value(config.address()))
            .row(painter, "model", painter.value(config.model()))
            .row(painter, "display_unit", painter.value(unit))
            .row(painter, "scan_mode", painter.value(config.scan_mode()))
            .row(painter, "adapter", painter.value(or_dash(config.adapter())))
            .row(painter, "body_profile", painter.value(profile));

        writeln!(f, "{}", painter.heading("Waiting for scale:"))?;
        write!(f, "{table}")
    }
}

/// Renders the closing line of a listen run.
pub(crate) struct ListenSummaryView<'a> {
    received: usize,
    stop_reason: &'a ListenStopReason,
    painter: &'a Painter,
}

impl<'a> ListenSummaryView<'a> {
    pub(crate) fn new(
        received: usize,
        stop_reason: &'a ListenStopReason,
        painter: &'a Painter,
    ) -> Self {
        Self {
            received,
            stop_reason,
            painter,
        }
    }
}

impl Display for ListenSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let tone = if self.received > 0 {
            Tone::Good
        } else {
            Tone::Caution
        };
        let noun = if self.received == 1 {
            "measurement"
        } else {
            "measurements"
        };
        write!(
            f,
            "{} {}",
            self.painter
                .paint(tone, format!("Received {} {noun}", self.received)),
            self.painter.muted(format!("({})", self.stop_reason))
        )
    }
}
