//! Scale sessions and the per-model protocol state machines they drive.

mod esf24;
mod esf551;
mod model;
mod session;
mod state;

pub use self::esf24::{Esf24Protocol, HandshakeFlags, HandshakeStep};
pub use self::esf551::Esf551Protocol;
pub use self::model::{Reading, ReadingKey, ScaleModel, ScaleResult, ScanMode};
pub use self::session::{ResultCallback, Scale, ScaleConfig, SessionPhase};
pub use self::state::{
    CommandKind, FrameOutcome, Measurement, OutboundCommand, ScaleProtocol, UnitPreference,
};
