//! Bioelectrical-impedance body composition estimates.
//!
//! Fat-free mass follows Deurenberg et al. (1991), total body water follows
//! Kushner & Schoeller (1986) with the fat-free-mass hydration constant of
//! Wang et al. (1999) when no impedance was measured, skeletal muscle follows
//! Janssen et al. (2000) and basal metabolic rate follows Mifflin-St Jeor
//! (1990). Every output is bounded so the result stays finite and
//! non-negative over weight 20-300 kg, height 1.0-2.2 m, age 1-120 and
//! impedance 0-2000 ohm.
//!
//! Body fat and body water are clamped into per-sex bands. The female fat
//! band sits above the male one and the male water band above the female
//! one, matching the direction of the sex term in each equation, so the two
//! sexes never land on the same bounded value.

use serde::Serialize;
use strum_macros::{Display, EnumString};
use time::Date;
use time::macros::format_description;

use crate::error::ConfigError;

/// Shortest height accepted by [`BodyProfile`], in metres.
pub const MIN_HEIGHT_M: f64 = 1.0;
/// Tallest height accepted by [`BodyProfile`], in metres.
pub const MAX_HEIGHT_M: f64 = 2.2;

const MIN_AGE: u8 = 1;
const MAX_AGE: u8 = 120;
const MIN_IMPEDANCE_OHM: f64 = 100.0;
const MAX_IMPEDANCE_OHM: f64 = 2000.0;
const FAT_FREE_HYDRATION: f64 = 0.732;

/// Biological sex used by the estimation equations.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    fn indicator(self) -> f64 {
        match self {
            Self::Male => 1.0,
            Self::Female => 0.0,
        }
    }

    fn body_fat_band(self) -> (f64, f64) {
        match self {
            Self::Male => (3.0, 70.0),
            Self::Female => (8.0, 75.0),
        }
    }

    fn body_water_band(self) -> (f64, f64) {
        match self {
            Self::Male => (37.0, 75.0),
            Self::Female => (35.0, 73.0),
        }
    }
}

/// Static user attributes needed to turn a weighing into body metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyProfile {
    sex: Sex,
    birthdate: Date,
    height_m: f64,
}

impl BodyProfile {
    /// Creates a validated body profile.
    ///
    /// # Errors
    ///
    /// Returns an error when `height_m` is outside `1.0..=2.2`.
    ///
    /// ```
    /// use esf::{BodyProfile, Sex};
    /// use time::macros::date;
    ///
    /// let profile = BodyProfile::new(Sex::Female, date!(1990 - 01 - 01), 1.65)?;
    /// assert_eq!(36, profile.age_on(date!(2026 - 06 - 01)));
    /// # Ok::<(), esf::ConfigError>(())
    /// ```
    pub fn new(sex: Sex, birthdate: Date, height_m: f64) -> Result<Self, ConfigError> {
        if !(MIN_HEIGHT_M..=MAX_HEIGHT_M).contains(&height_m) {
            return Err(ConfigError::InvalidHeight {
                value: height_m,
                min: MIN_HEIGHT_M,
                max: MAX_HEIGHT_M,
            });
        }

        Ok(Self {
            sex,
            birthdate,
            height_m,
        })
    }

    #[must_use]
    pub fn sex(&self) -> Sex {
        self.sex
    }

    #[must_use]
    pub fn birthdate(&self) -> Date {
        self.birthdate
    }

    #[must_use]
    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    /// Whole years of age on `today`, clamped into `1..=120`.
    #[must_use]
    pub fn age_on(&self, today: Date) -> u8 {
        let mut years = today.year() - self.birthdate.year();
        let birthday_pending = (u8::from(today.month()), today.day())
            < (u8::from(self.birthdate.month()), self.birthdate.day());
        if birthday_pending {
            years -= 1;
        }

        let clamped = years.clamp(i32::from(MIN_AGE), i32::from(MAX_AGE));
        u8::try_from(clamped).unwrap_or(MAX_AGE)
    }

    /// Computes metrics for one weighing taken on `today`.
    #[must_use]
    pub fn metrics_for(&self, weight_kg: f64, impedance: u16, today: Date) -> BodyMetrics {
        BodyMetrics::new(
            weight_kg,
            self.height_m,
            self.age_on(today),
            self.sex,
            impedance,
        )
    }
}

/// Parses a `YYYY-MM-DD` birthdate.
///
/// # Errors
///
/// Returns an error when `value` is not a calendar date in that format.
pub fn parse_birthdate(value: &str) -> Result<Date, ConfigError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        ConfigError::InvalidBirthdate {
            value: value.to_string(),
        }
    })
}

/// Body composition derived from one weighing.
///
/// Outputs are a pure function of the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodyMetrics {
    weight_kg: f64,
    height_m: f64,
    age: u8,
    sex: Sex,
    impedance: u16,
    body_mass_index: f64,
    body_fat_percentage: f64,
    fat_free_weight: f64,
    subcutaneous_fat_percentage: f64,
    visceral_fat_value: f64,
    body_water_percentage: f64,
    basal_metabolic_rate: f64,
    skeletal_muscle_percentage: f64,
    muscle_mass: f64,
    bone_mass: f64,
    protein_percentage: f64,
    metabolic_age: f64,
    health_score: f64,
}

impl BodyMetrics {
    /// Computes all metrics. An `impedance` of `0` means "not measured" and
    /// switches to the anthropometric fallbacks.
    ///
    /// ```
    /// use esf::{BodyMetrics, Sex};
    ///
    /// let metrics = BodyMetrics::new(75.0, 1.80, 30, Sex::Male, 500);
    /// assert!((metrics.body_mass_index() - 23.15).abs() < 0.01);
    /// assert!(metrics.basal_metabolic_rate() > 0.0);
    /// ```
    #[must_use]
    pub fn new(weight_kg: f64, height_m: f64, age: u8, sex: Sex, impedance: u16) -> Self {
        let height_cm = height_m * 100.0;
        let age_years = f64::from(age.clamp(MIN_AGE, MAX_AGE));
        let male = sex.indicator();
        let resistance = (impedance > 0)
            .then(|| f64::from(impedance).clamp(MIN_IMPEDANCE_OHM, MAX_IMPEDANCE_OHM));

        let body_mass_index = weight_kg / (height_m * height_m);

        let estimated_fat = match resistance {
            Some(resistance) => {
                let fat_free = 0.340 * height_cm * height_cm / resistance
                    + 15.34 * height_m
                    + 0.273 * weight_kg
                    - 0.127 * age_years
                    + 4.56 * male
                    - 12.44;
                (weight_kg - fat_free) / weight_kg * 100.0
            }
            None => 1.2 * body_mass_index + 0.23 * age_years - 10.8 * male - 5.4,
        };
        let body_fat_percentage = clamp_band(estimated_fat, sex.body_fat_band());
        let fat_free_weight = weight_kg * (1.0 - body_fat_percentage / 100.0);

        let total_body_water = match (resistance, sex) {
            (Some(resistance), Sex::Male) => {
                0.396 * height_cm * height_cm / resistance + 0.143 * weight_kg + 8.399
            }
            (Some(resistance), Sex::Female) => {
                0.382 * height_cm * height_cm / resistance + 0.105 * weight_kg + 8.315
            }
            (None, _) => FAT_FREE_HYDRATION * fat_free_weight,
        };
        let body_water_percentage =
            clamp_band(total_body_water / weight_kg * 100.0, sex.body_water_band());
        let body_water_kg = weight_kg * body_water_percentage / 100.0;

        let bone_fraction = match sex {
            Sex::Male => 0.054,
            Sex::Female => 0.050,
        };
        let bone_mass = fat_free_weight * bone_fraction;
        let muscle_mass = fat_free_weight - bone_mass;

        let skeletal_muscle = match resistance {
            Some(resistance) => {
                0.401 * height_cm * height_cm / resistance + 3.825 * male - 0.071 * age_years
                    + 5.102
            }
            None => 0.5 * muscle_mass,
        };
        let skeletal_muscle_percentage =
            (skeletal_muscle.clamp(0.0, muscle_mass) / weight_kg * 100.0).max(0.0);

        let protein_percentage = ((muscle_mass - body_water_kg) / weight_kg * 100.0).max(0.0);

        let basal_metabolic_rate = match sex {
            Sex::Male => 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age_years + 5.0,
            Sex::Female => 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age_years - 161.0,
        }
        .max(1.0);

        let visceral_fat_value = match sex {
            Sex::Male => 0.8 * body_mass_index + 0.12 * age_years - 13.0,
            Sex::Female => 0.7 * body_mass_index + 0.10 * age_years - 12.0,
        }
        .clamp(1.0, 59.0);

        let subcutaneous_share = match sex {
            Sex::Male => 0.82,
            Sex::Female => 0.88,
        };
        let subcutaneous_fat_percentage = body_fat_percentage * subcutaneous_share;

        let healthy_fat = healthy_body_fat_range(sex);
        let healthy_fat_midpoint = (healthy_fat.0 + healthy_fat.1) / 2.0;
        let metabolic_age = (age_years + 0.5 * (body_fat_percentage - healthy_fat_midpoint))
            .clamp(f64::from(MIN_AGE), f64::from(MAX_AGE));

        let health_score = health_score(
            sex,
            body_mass_index,
            body_fat_percentage,
            visceral_fat_value,
            body_water_percentage,
        );

        Self {
            weight_kg,
            height_m,
            age,
            sex,
            impedance,
            body_mass_index,
            body_fat_percentage,
            fat_free_weight,
            subcutaneous_fat_percentage,
            visceral_fat_value,
            body_water_percentage,
            basal_metabolic_rate,
            skeletal_muscle_percentage,
            muscle_mass,
            bone_mass,
            protein_percentage,
            metabolic_age,
            health_score,
        }
    }

    #[must_use]
    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    #[must_use]
    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    #[must_use]
    pub fn age(&self) -> u8 {
        self.age
    }

    #[must_use]
    pub fn sex(&self) -> Sex {
        self.sex
    }

    #[must_use]
    pub fn impedance(&self) -> u16 {
        self.impedance
    }

    /// Weight divided by height squared.
    #[must_use]
    pub fn body_mass_index(&self) -> f64 {
        self.body_mass_index
    }

    #[must_use]
    pub fn body_fat_percentage(&self) -> f64 {
        self.body_fat_percentage
    }

    /// Fat-free mass in kilograms.
    #[must_use]
    pub fn fat_free_weight(&self) -> f64 {
        self.fat_free_weight
    }

    #[must_use]
    pub fn subcutaneous_fat_percentage(&self) -> f64 {
        self.subcutaneous_fat_percentage
    }

    /// Visceral fat rating on the usual 1-59 scale.
    #[must_use]
    pub fn visceral_fat_value(&self) -> f64 {
        self.visceral_fat_value
    }

    #[must_use]
    pub fn body_water_percentage(&self) -> f64 {
        self.body_water_percentage
    }

    /// Basal metabolic rate in kcal/day.
    #[must_use]
    pub fn basal_metabolic_rate(&self) -> f64 {
        self.basal_metabolic_rate
    }

    #[must_use]
    pub fn skeletal_muscle_percentage(&self) -> f64 {
        self.skeletal_muscle_percentage
    }

    /// Soft lean mass in kilograms.
    #[must_use]
    pub fn muscle_mass(&self) -> f64 {
        self.muscle_mass
    }

    /// Bone mineral mass in kilograms.
    #[must_use]
    pub fn bone_mass(&self) -> f64 {
        self.bone_mass
    }

    #[must_use]
    pub fn protein_percentage(&self) -> f64 {
        self.protein_percentage
    }

    #[must_use]
    pub fn metabolic_age(&self) -> f64 {
        self.metabolic_age
    }

    /// Aggregate score in `0..=100`.
    #[must_use]
    pub fn health_score(&self) -> f64 {
        self.health_score
    }
}

fn clamp_band(value: f64, (min, max): (f64, f64)) -> f64 {
    value.clamp(min, max)
}

fn healthy_body_fat_range(sex: Sex) -> (f64, f64) {
    match sex {
        Sex::Male => (8.0, 20.0),
        Sex::Female => (21.0, 33.0),
    }
}

fn health_score(
    sex: Sex,
    body_mass_index: f64,
    body_fat_percentage: f64,
    visceral_fat_value: f64,
    body_water_percentage: f64,
) -> f64 {
    let minimum_water = match sex {
        Sex::Male => 50.0,
        Sex::Female => 45.0,
    };

    let penalty = 4.0 * distance_outside(body_mass_index, (18.5, 25.0))
        + 1.5 * distance_outside(body_fat_percentage, healthy_body_fat_range(sex))
        + 2.0 * (visceral_fat_value - 9.0).max(0.0)
        + (minimum_water - body_water_percentage).max(0.0);

    (100.0 - penalty).clamp(0.0, 100.0)
}

fn distance_outside(value: f64, (low, high): (f64, f64)) -> f64 {
    if value < low {
        low - value
    } else if value > high {
        value - high
    } else {
        0.0
    }
}
