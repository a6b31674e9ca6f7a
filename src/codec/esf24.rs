use time::OffsetDateTime;
use tracing::trace;

use crate::protocol::WeightUnit;

use super::round_centi;

const UNIT_QUERY_LEN: usize = 15;
const UNIT_QUERY_PREFIX: [u8; 3] = [0x12, 0x0F, 0x15];
const MEASUREMENT_REQUEST_LEN: usize = 11;
const MEASUREMENT_REQUEST_PREFIX: [u8; 3] = [0x14, 0x0B, 0x15];
const WEIGHT_FRAME_LEN: usize = 11;
const WEIGHT_FRAME_PREFIX: [u8; 3] = [0x10, 0x0B, 0x15];
const WEIGHT_STATUS_OFFSET: usize = 5;
const WEIGHT_STATUS_STABLE: u8 = 0x01;

/// Set-display-unit command. Byte 8 is the additive checksum, so the unit
/// selector lands in both byte 3 and byte 8.
const UNIT_UPDATE_TEMPLATE: [u8; 9] = [0x13, 0x09, 0x15, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x50];
const UNIT_SELECTOR_OFFSETS: [usize; 2] = [3, 8];

const MEASUREMENT_INIT_PREFIX: [u8; 3] = [0x20, 0x08, 0x15];
const END_MEASUREMENT_COMMAND: [u8; 5] = [0x1F, 0x05, 0x15, 0x10, 0x49];

/// Seconds between the Unix epoch and the scale's epoch (2000-01-01T00:00:00+08:00).
pub(crate) const DEVICE_EPOCH_OFFSET_SECS: i64 = 946_656_000;

/// Frame shapes understood on the ESF-24 notify characteristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Esf24Frame {
    /// The scale asks which unit to display.
    UnitQuery,
    /// The scale is ready to weigh and wants a timestamp.
    MeasurementRequest,
    /// A final weight reading.
    StableWeight {
        /// Weight in kilograms, rounded to two decimals.
        weight_kg: f64,
    },
}

/// Codec for the ESF-24 three-phase handshake protocol.
pub struct Esf24Codec;

impl Esf24Codec {
    /// Classifies one notification, returning `None` for unknown shapes.
    ///
    /// ```
    /// use esf::{Esf24Codec, Esf24Frame};
    ///
    /// let frame = [0x10, 0x0B, 0x15, 0x27, 0x10, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
    /// assert_eq!(
    ///     Some(Esf24Frame::StableWeight { weight_kg: 100.0 }),
    ///     Esf24Codec::classify(&frame)
    /// );
    /// ```
    #[must_use]
    pub fn classify(payload: &[u8]) -> Option<Esf24Frame> {
        match payload.len() {
            UNIT_QUERY_LEN if payload.starts_with(&UNIT_QUERY_PREFIX) => {
                Some(Esf24Frame::UnitQuery)
            }
            MEASUREMENT_REQUEST_LEN if payload.starts_with(&MEASUREMENT_REQUEST_PREFIX) => {
                Some(Esf24Frame::MeasurementRequest)
            }
            WEIGHT_FRAME_LEN
                if payload.starts_with(&WEIGHT_FRAME_PREFIX)
                    && payload[WEIGHT_STATUS_OFFSET] == WEIGHT_STATUS_STABLE =>
            {
                Some(Esf24Frame::StableWeight {
                    weight_kg: Self::decode_weight(payload),
                })
            }
            _ => {
                trace!(payload_len = payload.len(), "unrecognised ESF-24 frame");
                None
            }
        }
    }

    fn decode_weight(payload: &[u8]) -> f64 {
        let raw = u16::from_be_bytes([payload[3], payload[4]]);
        round_centi(f64::from(raw) / 100.0)
    }

    /// Builds the set-display-unit command.
    ///
    /// ```
    /// use esf::{Esf24Codec, WeightUnit};
    ///
    /// let command = Esf24Codec::unit_update_command(WeightUnit::St);
    /// assert_eq!(0x08, command[3]);
    /// assert_eq!(0x58, command[8]);
    /// ```
    #[must_use]
    pub fn unit_update_command(unit: WeightUnit) -> [u8; 9] {
        let selector = match unit {
            WeightUnit::Kg => 0b0001,
            WeightUnit::Lb => 0b0010,
            WeightUnit::St => 0b1000,
        };

        let mut command = UNIT_UPDATE_TEMPLATE;
        for offset in UNIT_SELECTOR_OFFSETS {
            command[offset] = (command[offset] & 0xF0) | selector;
        }
        command
    }

    /// Builds the measurement-initiation command for `now`.
    #[must_use]
    pub fn measurement_init_command(now: OffsetDateTime) -> [u8; 8] {
        let device_seconds = now.unix_timestamp() - DEVICE_EPOCH_OFFSET_SECS;
        let device_seconds = u32::try_from(device_seconds.max(0)).unwrap_or(u32::MAX);

        let mut command = [0u8; 8];
        command[..3].copy_from_slice(&MEASUREMENT_INIT_PREFIX);
        command[3..7].copy_from_slice(&device_seconds.to_le_bytes());
        command[7] = additive_checksum(&command[..7]);
        command
    }

    /// Returns the command acknowledging a stable weight.
    #[must_use]
    pub fn end_measurement_command() -> [u8; 5] {
        END_MEASUREMENT_COMMAND
    }
}

fn additive_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use time::macros::datetime;

    use super::*;

    fn frame(prefix: [u8; 3], len: usize) -> Vec<u8> {
        let mut frame = vec![0x00; len];
        frame[..3].copy_from_slice(&prefix);
        frame
    }

    #[test]
    fn classify_reference_stable_weight() {
        let payload = [0x10, 0x0B, 0x15, 0x27, 0x10, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            Some(Esf24Frame::StableWeight { weight_kg: 100.0 }),
            Esf24Codec::classify(&payload)
        );
    }

    #[rstest]
    #[case(frame(UNIT_QUERY_PREFIX, 15), Some(Esf24Frame::UnitQuery))]
    #[case(frame(MEASUREMENT_REQUEST_PREFIX, 11), Some(Esf24Frame::MeasurementRequest))]
    #[case(frame(UNIT_QUERY_PREFIX, 11), None)]
    #[case(frame(MEASUREMENT_REQUEST_PREFIX, 15), None)]
    #[case(frame(WEIGHT_FRAME_PREFIX, 11), None)]
    #[case(frame(WEIGHT_FRAME_PREFIX, 15), None)]
    #[case(vec![0x10, 0x0B], None)]
    #[case(vec![], None)]
    fn classify_distinguishes_by_length_and_prefix(
        #[case] payload: Vec<u8>,
        #[case] expected: Option<Esf24Frame>,
    ) {
        assert_eq!(expected, Esf24Codec::classify(&payload));
    }

    #[test]
    fn classify_ignores_unstable_weight() {
        let payload = [0x10, 0x0B, 0x15, 0x1C, 0x52, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(None, Esf24Codec::classify(&payload));
    }

    #[rstest]
    #[case([0x1C, 0x52], 72.5)]
    #[case([0x00, 0x01], 0.01)]
    #[case([0xFF, 0xFF], 655.35)]
    fn classify_decodes_big_endian_weight(#[case] raw: [u8; 2], #[case] expected: f64) {
        let mut payload = frame(WEIGHT_FRAME_PREFIX, 11);
        payload[3..5].copy_from_slice(&raw);
        payload[WEIGHT_STATUS_OFFSET] = WEIGHT_STATUS_STABLE;
        assert_eq!(
            Some(Esf24Frame::StableWeight {
                weight_kg: expected
            }),
            Esf24Codec::classify(&payload)
        );
    }

    #[rstest]
    #[case(WeightUnit::Kg, 0x01, 0x51)]
    #[case(WeightUnit::Lb, 0x02, 0x52)]
    #[case(WeightUnit::St, 0x08, 0x58)]
    fn unit_update_command_sets_selector_in_both_bytes(
        #[case] unit: WeightUnit,
        #[case] byte3: u8,
        #[case] byte8: u8,
    ) {
        let command = Esf24Codec::unit_update_command(unit);
        assert_eq!(byte3, command[3]);
        assert_eq!(byte8, command[8]);
        assert_eq!(UNIT_UPDATE_TEMPLATE[..3], command[..3]);
        assert_eq!(UNIT_UPDATE_TEMPLATE[4..8], command[4..8]);
        assert_eq!(additive_checksum(&command[..8]), command[8]);
    }

    #[test]
    fn measurement_init_command_matches_known_timestamp() {
        let command = Esf24Codec::measurement_init_command(datetime!(2026-02-16 09:30:45 UTC));
        assert_eq!([0x20, 0x08, 0x15, 0xC5, 0x10, 0x26, 0x31, 0x69], command);
    }

    #[rstest]
    fn measurement_init_checksum_is_sum_of_leading_bytes(
        #[values(
            datetime!(2000-01-01 00:00:00 UTC),
            datetime!(2024-07-04 18:00:01 UTC),
            datetime!(2031-12-31 23:59:59 UTC),
            datetime!(2099-06-15 12:34:56 UTC)
        )]
        now: OffsetDateTime,
    ) {
        let command = Esf24Codec::measurement_init_command(now);
        let sum: u32 = command[..7].iter().map(|byte| u32::from(*byte)).sum();
        assert_eq!((sum % 256) as u8, command[7]);
        let device_seconds = u32::from_le_bytes([command[3], command[4], command[5], command[6]]);
        assert_eq!(now.unix_timestamp() - DEVICE_EPOCH_OFFSET_SECS, i64::from(device_seconds));
    }

    #[test]
    fn end_measurement_command_is_fixed() {
        assert_eq!([0x1F, 0x05, 0x15, 0x10, 0x49], Esf24Codec::end_measurement_command());
    }
}
