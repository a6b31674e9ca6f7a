//! Stateless frame codecs for each supported scale model.

mod esf24;
mod esf551;

pub use self::esf24::{Esf24Codec, Esf24Frame};
pub use self::esf551::{Esf551Codec, Esf551Measurement};

/// Rounds a decoded weight to two decimal places.
pub(crate) fn round_centi(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
