//! BLE transports: the traits a scale session drives, a `btleplug` backend
//! and an in-memory fake.

mod btleplug_backend;
mod fake_backend;
mod transport;

pub use self::btleplug_backend::BtleplugTransport;
pub(crate) use self::fake_backend::{AdvertisementFixture, HexPayload, NotificationPayloads};
pub use self::fake_backend::{FakeActivity, FakeFailure, FakeNotifier, FakeProbe, FakeTransport};
pub use self::transport::{
    AdvertisedDevice, AdvertisementStream, NotificationStream, ScaleLink, ScaleTransport,
    ScanRequest, WriteMode,
};
