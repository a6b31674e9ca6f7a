use thiserror::Error;

use crate::protocol::{EndpointId, endpoint_metadata};
use crate::scale::ScaleModel;

/// Errors returned by BLE transport operations.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("no BLE adapter matching `{hint}` was found")]
    AdapterNotFound { hint: String },
    #[error("device `{address}` is not known to the adapter")]
    DeviceNotFound { address: String },
    #[error(
        "required characteristic `{name}` ({uuid}) was not found on the connected device",
        name = endpoint_metadata(*endpoint).name(),
        uuid = endpoint_metadata(*endpoint).uuid()
    )]
    MissingEndpoint { endpoint: EndpointId },
    #[error("fake transport rejected `{operation}`")]
    FakeTransport { operation: &'static str },
    #[error("failed while waiting for Ctrl+C")]
    CtrlC { source: std::io::Error },
}

/// Invalid scale configuration, reported synchronously to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("the {model} scale has no automatic display unit; a unit must be set")]
    DisplayUnitRequired { model: ScaleModel },
    #[error("weight {value} kg must be a positive number")]
    InvalidWeight { value: f64 },
    #[error("height {value} m is outside the supported range ({min}..={max})")]
    InvalidHeight { value: f64, min: f64, max: f64 },
    #[error("birthdate `{value}` is not a valid YYYY-MM-DD date")]
    InvalidBirthdate { value: String },
    #[error("unknown weight unit ordinal {value}")]
    UnknownWeightUnit { value: u8 },
}

/// Errors returned when parsing fake transport fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake advertisement fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain two pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("hex payload is invalid")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake advertisement fixture while fake mode is enabled")]
    MissingFakeScanFixture,
    #[error("--sex, --birthdate and --height must be given together")]
    IncompleteBodyProfile,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
