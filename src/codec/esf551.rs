use serde::Serialize;
use tracing::trace;

use crate::protocol::WeightUnit;

use super::round_centi;

/// Exact length of an ESF-551 measurement notification.
pub const MEASUREMENT_FRAME_LEN: usize = 22;

const FRAME_MAGIC: [u8; 2] = [0xA5, 0x02];
const FRAME_LENGTH_FIELD: [u8; 2] = [0x10, 0x00];
const MEASUREMENT_COMMAND: [u8; 4] = [0x01, 0x61, 0xA1, 0x00];
const MEASUREMENT_MARKER: u8 = 0x01;
const MARKER_OFFSET: usize = 19;
const IMPEDANCE_FLAG_OFFSET: usize = 20;
const DISPLAY_UNIT_OFFSET: usize = 21;

/// Set-display-unit command. Byte 5 is the frame checksum and byte 10 the unit.
const UNIT_CHANGE_TEMPLATE: [u8; 11] = [
    0xA5, 0x22, 0xA6, 0x05, 0x00, 0x2B, 0x01, 0xC1, 0xA0, 0x00, 0x00,
];
const UNIT_CHANGE_CHECKSUM_OFFSET: usize = 5;
const UNIT_CHANGE_UNIT_OFFSET: usize = 10;
const UNIT_CHANGE_CHECKSUM_BASE: u8 = 43;

/// One decoded ESF-551 measurement frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Esf551Measurement {
    weight_kg: f64,
    impedance: Option<u16>,
    display_unit: u8,
}

impl Esf551Measurement {
    /// Weight in kilograms, rounded to two decimals.
    #[must_use]
    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    /// Bioelectrical impedance in ohms, when the scale measured one.
    #[must_use]
    pub fn impedance(&self) -> Option<u16> {
        self.impedance
    }

    /// Raw display-unit byte as reported by the scale.
    #[must_use]
    pub fn display_unit(&self) -> u8 {
        self.display_unit
    }
}

/// Codec for the ESF-551 single-frame protocol.
pub struct Esf551Codec;

impl Esf551Codec {
    /// Decodes a measurement notification.
    ///
    /// Returns `None` for any frame that is not a measurement; the same
    /// characteristic carries other traffic.
    ///
    /// ```
    /// use esf::Esf551Codec;
    ///
    /// let frame = [
    ///     0xA5, 0x02, 0x00, 0x10, 0x00, 0x00, 0x01, 0x61, 0xA1, 0x00, 0xE8, 0x03, 0x00, 0x64,
    ///     0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00,
    /// ];
    /// let measurement = Esf551Codec::decode(&frame).expect("frame is a measurement");
    /// assert_eq!(1.0, measurement.weight_kg());
    /// assert_eq!(Some(100), measurement.impedance());
    /// ```
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Esf551Measurement> {
        if payload.len() != MEASUREMENT_FRAME_LEN
            || payload[0..2] != FRAME_MAGIC
            || payload[3..5] != FRAME_LENGTH_FIELD
            || payload[6..10] != MEASUREMENT_COMMAND
            || payload[MARKER_OFFSET] != MEASUREMENT_MARKER
        {
            trace!(payload_len = payload.len(), "not an ESF-551 measurement frame");
            return None;
        }

        let raw_weight = u32::from_le_bytes([payload[10], payload[11], payload[12], 0]);
        let raw_impedance = u16::from_le_bytes([payload[13], payload[14]]);
        let impedance =
            (payload[IMPEDANCE_FLAG_OFFSET] == 1 && raw_impedance != 0).then_some(raw_impedance);

        Some(Esf551Measurement {
            weight_kg: round_centi(f64::from(raw_weight) / 1000.0),
            impedance,
            display_unit: payload[DISPLAY_UNIT_OFFSET],
        })
    }

    /// Builds the command that switches the scale's display unit.
    ///
    /// ```
    /// use esf::{Esf551Codec, WeightUnit};
    ///
    /// let command = Esf551Codec::unit_change_command(WeightUnit::Lb);
    /// assert_eq!(42, command[5]);
    /// assert_eq!(1, command[10]);
    /// ```
    #[must_use]
    pub fn unit_change_command(unit: WeightUnit) -> [u8; 11] {
        let mut command = UNIT_CHANGE_TEMPLATE;
        command[UNIT_CHANGE_CHECKSUM_OFFSET] = UNIT_CHANGE_CHECKSUM_BASE - unit.ordinal();
        command[UNIT_CHANGE_UNIT_OFFSET] = unit.ordinal();
        command
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const REFERENCE_FRAME: [u8; 22] = [
        0xA5, 0x02, 0x00, 0x10, 0x00, 0x00, 0x01, 0x61, 0xA1, 0x00, 0xE8, 0x03, 0x00, 0x64, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00,
    ];

    fn measurement_frame(raw_weight: u32, impedance: u16, flag: u8, unit: u8) -> [u8; 22] {
        let mut frame = REFERENCE_FRAME;
        frame[10..13].copy_from_slice(&raw_weight.to_le_bytes()[..3]);
        frame[13..15].copy_from_slice(&impedance.to_le_bytes());
        frame[IMPEDANCE_FLAG_OFFSET] = flag;
        frame[DISPLAY_UNIT_OFFSET] = unit;
        frame
    }

    #[test]
    fn decode_reference_frame() {
        let measurement = Esf551Codec::decode(&REFERENCE_FRAME).expect("reference frame decodes");
        assert_eq!(1.0, measurement.weight_kg());
        assert_eq!(Some(100), measurement.impedance());
        assert_eq!(0, measurement.display_unit());
    }

    #[test]
    fn decode_without_impedance_flag_omits_impedance() {
        let mut frame = REFERENCE_FRAME;
        frame[IMPEDANCE_FLAG_OFFSET] = 0;
        let measurement = Esf551Codec::decode(&frame).expect("frame decodes");
        assert_eq!(1.0, measurement.weight_kg());
        assert_eq!(None, measurement.impedance());
    }

    #[rstest]
    #[case(72_450, 512, 1, 0, 72.45, Some(512))]
    #[case(80_126, 0, 1, 1, 80.13, None)]
    #[case(150_004, 430, 0, 2, 150.0, None)]
    #[case(0xFF_FFF0, 2000, 1, 1, 16777.2, Some(2000))]
    fn decode_recovers_built_fields(
        #[case] raw_weight: u32,
        #[case] impedance: u16,
        #[case] flag: u8,
        #[case] unit: u8,
        #[case] expected_weight: f64,
        #[case] expected_impedance: Option<u16>,
    ) {
        let frame = measurement_frame(raw_weight, impedance, flag, unit);
        let measurement = Esf551Codec::decode(&frame).expect("built frame decodes");
        assert!((measurement.weight_kg() - f64::from(raw_weight) / 1000.0).abs() <= 0.01);
        assert_eq!(expected_weight, measurement.weight_kg());
        assert_eq!(expected_impedance, measurement.impedance());
        assert_eq!(unit, measurement.display_unit());
    }

    #[test]
    fn decode_rejects_every_length_but_22() {
        for len in (0..64).filter(|len| *len != MEASUREMENT_FRAME_LEN) {
            let mut frame = REFERENCE_FRAME.to_vec();
            frame.resize(len, 0x00);
            assert_eq!(None, Esf551Codec::decode(&frame), "length {len}");
        }
    }

    #[rstest]
    fn decode_rejects_fixed_byte_mismatch(#[values(0, 1, 3, 4, 6, 7, 8, 9, 19)] offset: usize) {
        let mut frame = REFERENCE_FRAME;
        frame[offset] ^= 0xFF;
        assert_eq!(None, Esf551Codec::decode(&frame));
    }

    #[test]
    fn decode_rejects_all_zero_frame() {
        assert_eq!(None, Esf551Codec::decode(&[0x00; 22]));
    }

    #[rstest]
    fn unit_change_command_keeps_checksum_relationship(
        #[values(WeightUnit::Kg, WeightUnit::Lb, WeightUnit::St)] unit: WeightUnit,
    ) {
        let command = Esf551Codec::unit_change_command(unit);
        assert_eq!(43, command[5] + unit.ordinal());
        assert_eq!(unit.ordinal(), command[10]);

        let others: u32 = command
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != UNIT_CHANGE_CHECKSUM_OFFSET)
            .map(|(_, byte)| u32::from(*byte))
            .sum();
        assert_eq!(0xFF - (others % 256) as u8, command[5]);
    }

    #[test]
    fn unit_change_command_only_touches_checksum_and_unit() {
        let command = Esf551Codec::unit_change_command(WeightUnit::St);
        assert_eq!(
            [0xA5, 0x22, 0xA6, 0x05, 0x00, 0x29, 0x01, 0xC1, 0xA0, 0x00, 0x02],
            command
        );
    }
}
