use std::collections::HashMap;
use std::sync::LazyLock;

use serde_with::SerializeDisplay;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::ConfigError;

/// GATT characteristics used by Etekcity scales.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum EndpointId {
    /// Characteristic that notifies weight frames.
    #[strum(to_string = "weight_notify")]
    WeightNotify,
    /// Characteristic that accepts command frames.
    #[strum(to_string = "command_write")]
    CommandWrite,
    /// Device Information hardware revision string.
    #[strum(to_string = "hardware_revision")]
    HardwareRevision,
    /// Device Information software revision string.
    #[strum(to_string = "software_revision")]
    SoftwareRevision,
}

/// Descriptive metadata for one characteristic.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
}

impl EndpointMetadata {
    /// Human-readable endpoint name.
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    /// Characteristic UUID.
    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }
}

static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> = LazyLock::new(|| {
    EndpointId::iter()
        .map(|endpoint| (endpoint, metadata_for(endpoint)))
        .collect()
});

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    *ENDPOINTS_BY_ID
        .get(&endpoint)
        .unwrap_or(&metadata_for(endpoint))
}

/// Resolves a characteristic UUID back to its endpoint.
pub(crate) fn endpoint_for_uuid(uuid: &str) -> Option<EndpointId> {
    EndpointId::iter()
        .find(|endpoint| endpoint_metadata(*endpoint).uuid().eq_ignore_ascii_case(uuid))
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::WeightNotify => EndpointMetadata {
            name: "weight notify",
            uuid: "0000fff1-0000-1000-8000-00805f9b34fb",
        },
        EndpointId::CommandWrite => EndpointMetadata {
            name: "command write",
            uuid: "0000fff2-0000-1000-8000-00805f9b34fb",
        },
        EndpointId::HardwareRevision => EndpointMetadata {
            name: "hardware revision string",
            uuid: "00002a27-0000-1000-8000-00805f9b34fb",
        },
        EndpointId::SoftwareRevision => EndpointMetadata {
            name: "software revision string",
            uuid: "00002a28-0000-1000-8000-00805f9b34fb",
        },
    }
}

/// Unit shown on the scale's own display.
///
/// The ordinal is sent on the wire, so the discriminants are fixed.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    SerializeDisplay,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum WeightUnit {
    /// Kilograms.
    Kg = 0,
    /// Pounds.
    Lb = 1,
    /// Stones.
    St = 2,
}

impl WeightUnit {
    /// Returns the wire ordinal.
    ///
    /// ```
    /// use esf::WeightUnit;
    ///
    /// assert_eq!(2, WeightUnit::St.ordinal());
    /// ```
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WeightUnit {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Kg),
            1 => Ok(Self::Lb),
            2 => Ok(Self::St),
            _ => Err(ConfigError::UnknownWeightUnit { value }),
        }
    }
}
