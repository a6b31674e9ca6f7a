mod app;
mod body_metrics;
mod cli;
mod codec;
mod error;
mod hw;
mod protocol;
mod scale;
mod telemetry;
mod terminal;
mod utils;

pub use app::{TransportBackend, run, run_with_clients, run_with_log_level};
pub use body_metrics::{
    BodyMetrics, BodyProfile, MAX_HEIGHT_M, MIN_HEIGHT_M, Sex, parse_birthdate,
};
pub use cli::{
    Args, Command, DecodeArgs, FakeArgs, ListenArgs, LogLevel, MetricsArgs, OutputFormat,
};
pub use codec::{Esf24Codec, Esf24Frame, Esf551Codec, Esf551Measurement};
pub use error::{ConfigError, FixtureError, InteractionError};
pub use hw::{
    AdvertisedDevice, AdvertisementStream, BtleplugTransport, FakeActivity, FakeFailure,
    FakeNotifier, FakeProbe, FakeTransport, NotificationStream, ScaleLink, ScaleTransport,
    ScanRequest, WriteMode,
};
pub use protocol::{EndpointId, WeightUnit};
pub use scale::{
    CommandKind, Esf24Protocol, Esf551Protocol, FrameOutcome, HandshakeFlags, HandshakeStep,
    Measurement, OutboundCommand, Reading, ReadingKey, ResultCallback, Scale, ScaleConfig,
    ScaleModel, ScaleProtocol, ScaleResult, ScanMode, SessionPhase, UnitPreference,
};
pub use terminal::{SystemTerminalClient, TerminalClient};
