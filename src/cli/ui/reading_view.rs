use std::fmt::{self, Display, Formatter};

use crate::scale::{Reading, ReadingKey, ScaleResult};
use crate::utils::{format_value, or_dash};

use super::painter::Painter;
use super::table::FieldTable;

/// Unit suffix shown next to a reading value.
fn unit_suffix(key: ReadingKey) -> &'static str {
    match key {
        ReadingKey::Weight
        | ReadingKey::FatFreeWeight
        | ReadingKey::MuscleMass
        | ReadingKey::BoneMass => " kg",
        ReadingKey::Impedance => " Ω",
        ReadingKey::BodyFatPercentage
        | ReadingKey::SubcutaneousFatPercentage
        | ReadingKey::BodyWaterPercentage
        | ReadingKey::SkeletalMusclePercentage
        | ReadingKey::ProteinPercentage => " %",
        ReadingKey::BasalMetabolicRate => " kcal",
        ReadingKey::MetabolicAge => " y",
        ReadingKey::DisplayUnit
        | ReadingKey::BodyMassIndex
        | ReadingKey::VisceralFatValue
        | ReadingKey::HealthScore => "",
    }
}

fn reading_rows(table: FieldTable, reading: &Reading, painter: &Painter) -> FieldTable {
    reading.iter().fold(table, |table, (key, value)| {
        let rendered = format!("{}{}", format_value(value), unit_suffix(key));
        table.row(painter, key, painter.value(rendered))
    })
}

/// Renders a bare reading as a field/value table.
pub(crate) struct ReadingView<'a> {
    reading: &'a Reading,
    painter: &'a Painter,
}

impl<'a> ReadingView<'a> {
    pub(crate) fn new(reading: &'a Reading, painter: &'a Painter) -> Self {
        Self { reading, painter }
    }
}

impl Display for ReadingView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = reading_rows(FieldTable::new(), self.reading, self.painter);
        write!(f, "{table}")
    }
}

/// Renders one measurement delivered by a scale session.
pub(crate) struct ResultView<'a> {
    index: usize,
    result: &'a ScaleResult,
    painter: &'a Painter,
}

impl<'a> ResultView<'a> {
    pub(crate) fn new(index: usize, result: &'a ScaleResult, painter: &'a Painter) -> Self {
        Self {
            index,
            result,
            painter,
        }
    }
}

impl Display for ResultView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        let result = self.result;
        let table = FieldTable::new()
            .row(painter, "name", painter.value(or_dash(result.name())))
            .row(painter, "address", painter.value(result.address()))
            .row(painter, "hw_version", painter.value(or_dash(result.hw_version())))
            .row(painter, "sw_version", painter.value(or_dash(result.sw_version())))
            .row(painter, "unit", painter.value(result.display_unit()));
        let table = reading_rows(table, result.reading(), painter);

        writeln!(
            f,
            "{}",
            painter.heading(format!("Measurement #{}:", self.index))
        )?;
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::protocol::WeightUnit;

    fn result() -> ScaleResult {
        ScaleResult::new(
            Some("Etekcity Fitness Scale".into()),
            "AA:BB:CC:DD:EE:FF".into(),
            None,
            Some("1.0.3".into()),
            WeightUnit::Lb,
            Reading::with_weight(72.45).with_impedance(Some(512)),
        )
    }

    #[test]
    fn result_view_lists_metadata_and_values() {
        let painter = Painter::new(false);
        let result = result();
        let rendered = ResultView::new(3, &result, &painter).to_string();

        assert!(rendered.starts_with("Measurement #3:"));
        for expected in [
            "Etekcity Fitness Scale",
            "AA:BB:CC:DD:EE:FF",
            "1.0.3",
            "lb",
            "72.45 kg",
            "512 Ω",
        ] {
            assert!(rendered.contains(expected), "missing {expected}:\n{rendered}");
        }
    }

    #[test]
    fn missing_versions_render_as_dash() {
        let painter = Painter::new(false);
        let result = result();
        let rendered = ResultView::new(1, &result, &painter).to_string();
        let hw_line = rendered
            .lines()
            .find(|line| line.contains("hw_version"))
            .expect("hw_version row");
        assert!(hw_line.contains(" - "));
    }

    #[test]
    fn reading_view_uses_key_order() {
        let painter = Painter::new(false);
        let reading = Reading::with_weight(80.0).with(ReadingKey::BodyMassIndex, 24.69);
        let rendered = ReadingView::new(&reading, &painter).to_string();

        let weight = rendered.find("weight").expect("weight row");
        let bmi = rendered.find("body_mass_index").expect("bmi row");
        assert!(weight < bmi);
        assert_eq!(None, rendered.find("impedance"));
    }
}
