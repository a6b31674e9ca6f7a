use std::collections::BTreeMap;

use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};

use crate::body_metrics::BodyMetrics;
use crate::protocol::WeightUnit;

/// Supported scale families.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter, EnumString, Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ScaleModel {
    /// Single-frame protocol with optional impedance.
    Esf551,
    /// Three-phase handshake protocol, weight only.
    Esf24,
}

impl ScaleModel {
    /// Returns whether the scale reports its own display unit in every frame.
    #[must_use]
    pub fn reports_display_unit(self) -> bool {
        matches!(self, Self::Esf551)
    }
}

/// Scanning mode requested from the transport.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScanMode {
    #[default]
    Active,
    Passive,
}

/// Keys of the values carried in a [`Reading`].
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Display, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReadingKey {
    Weight,
    Impedance,
    DisplayUnit,
    BodyMassIndex,
    BodyFatPercentage,
    FatFreeWeight,
    SubcutaneousFatPercentage,
    VisceralFatValue,
    BodyWaterPercentage,
    BasalMetabolicRate,
    SkeletalMusclePercentage,
    MuscleMass,
    BoneMass,
    ProteinPercentage,
    MetabolicAge,
    HealthScore,
}

/// The numeric values of one measurement.
///
/// Weight is always present. Other keys appear when the scale or the
/// body-composition engine produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Reading {
    values: BTreeMap<ReadingKey, f64>,
}

impl Reading {
    pub(crate) fn with_weight(weight_kg: f64) -> Self {
        Self::default().with(ReadingKey::Weight, weight_kg)
    }

    pub(crate) fn with(mut self, key: ReadingKey, value: f64) -> Self {
        self.values.insert(key, value);
        self
    }

    pub(crate) fn with_impedance(self, impedance: Option<u16>) -> Self {
        match impedance {
            Some(impedance) => self.with(ReadingKey::Impedance, f64::from(impedance)),
            None => self,
        }
    }

    /// Adds every body-composition value.
    pub(crate) fn with_body_metrics(self, metrics: &BodyMetrics) -> Self {
        self.with_anthropometrics(metrics)
            .with(ReadingKey::BodyFatPercentage, metrics.body_fat_percentage())
            .with(ReadingKey::FatFreeWeight, metrics.fat_free_weight())
            .with(
                ReadingKey::SubcutaneousFatPercentage,
                metrics.subcutaneous_fat_percentage(),
            )
            .with(ReadingKey::VisceralFatValue, metrics.visceral_fat_value())
            .with(
                ReadingKey::BodyWaterPercentage,
                metrics.body_water_percentage(),
            )
            .with(
                ReadingKey::SkeletalMusclePercentage,
                metrics.skeletal_muscle_percentage(),
            )
            .with(ReadingKey::MuscleMass, metrics.muscle_mass())
            .with(ReadingKey::BoneMass, metrics.bone_mass())
            .with(ReadingKey::ProteinPercentage, metrics.protein_percentage())
            .with(ReadingKey::MetabolicAge, metrics.metabolic_age())
            .with(ReadingKey::HealthScore, metrics.health_score())
    }

    /// Adds only the values that do not depend on impedance.
    pub(crate) fn with_anthropometrics(self, metrics: &BodyMetrics) -> Self {
        self.with(ReadingKey::BodyMassIndex, metrics.body_mass_index())
            .with(
                ReadingKey::BasalMetabolicRate,
                metrics.basal_metabolic_rate(),
            )
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: ReadingKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    #[must_use]
    pub fn contains(&self, key: ReadingKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Weight in kilograms.
    #[must_use]
    pub fn weight_kg(&self) -> Option<f64> {
        self.get(ReadingKey::Weight)
    }

    /// Impedance in ohms.
    #[must_use]
    pub fn impedance(&self) -> Option<u16> {
        self.get(ReadingKey::Impedance)
            .and_then(|value| u16::try_from(value as i64).ok())
    }

    /// Iterates values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (ReadingKey, f64)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One stable measurement delivered to the result callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleResult {
    name: Option<String>,
    address: String,
    hw_version: Option<String>,
    sw_version: Option<String>,
    display_unit: WeightUnit,
    reading: Reading,
}

impl ScaleResult {
    pub(crate) fn new(
        name: Option<String>,
        address: String,
        hw_version: Option<String>,
        sw_version: Option<String>,
        display_unit: WeightUnit,
        reading: Reading,
    ) -> Self {
        Self {
            name,
            address,
            hw_version,
            sw_version,
            display_unit,
            reading,
        }
    }

    /// Advertised device name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn hw_version(&self) -> Option<&str> {
        self.hw_version.as_deref()
    }

    #[must_use]
    pub fn sw_version(&self) -> Option<&str> {
        self.sw_version.as_deref()
    }

    /// Unit the scale is displaying when the reading was taken.
    #[must_use]
    pub fn display_unit(&self) -> WeightUnit {
        self.display_unit
    }

    #[must_use]
    pub fn reading(&self) -> &Reading {
        &self.reading
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use time::macros::date;

    use super::*;
    use crate::body_metrics::{BodyProfile, Sex};

    fn metrics() -> BodyMetrics {
        let profile = BodyProfile::new(Sex::Female, date!(1990 - 05 - 12), 1.68)
            .expect("height is in range");
        profile.metrics_for(61.3, 480, date!(2026 - 03 - 01))
    }

    #[test]
    fn reading_with_full_metrics_holds_every_key() {
        let reading = Reading::with_weight(61.3)
            .with_impedance(Some(480))
            .with(ReadingKey::DisplayUnit, 0.0)
            .with_body_metrics(&metrics());

        assert_eq!(ReadingKey::iter().count(), reading.len());
        assert_eq!(Some(480), reading.impedance());
        assert_eq!(Some(61.3), reading.weight_kg());
    }

    #[test]
    fn anthropometrics_only_adds_bmi_and_bmr() {
        let reading = Reading::with_weight(61.3).with_anthropometrics(&metrics());
        let keys: Vec<ReadingKey> = reading.iter().map(|(key, _)| key).collect();
        assert_eq!(
            vec![
                ReadingKey::Weight,
                ReadingKey::BodyMassIndex,
                ReadingKey::BasalMetabolicRate
            ],
            keys
        );
        assert_eq!(None, reading.impedance());
    }

    #[test]
    fn reading_serializes_as_snake_case_map() {
        let reading = Reading::with_weight(72.45).with_impedance(Some(512));
        let json = serde_json::to_value(&reading).expect("reading serializes");
        assert_eq!(serde_json::json!({"weight": 72.45, "impedance": 512.0}), json);
    }

    #[test]
    fn scale_model_parses_case_insensitively() {
        assert_eq!(Ok(ScaleModel::Esf24), "ESF24".parse::<ScaleModel>().map_err(|_| ()));
        assert_eq!("esf551", ScaleModel::Esf551.to_string());
        assert!(ScaleModel::Esf551.reports_display_unit());
        assert!(!ScaleModel::Esf24.reports_display_unit());
    }
}
