use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::InteractionError;
use crate::protocol::EndpointId;
use crate::scale::ScanMode;

/// Stream of advertisements produced while a scan is running.
pub type AdvertisementStream = Pin<Box<dyn Stream<Item = AdvertisedDevice> + Send>>;

/// Stream of notification payloads. It ends when the device disconnects.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Write mode for a characteristic write.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WriteMode {
    /// Waits for the peripheral to acknowledge the write.
    WithResponse,
    /// Sends the write without waiting for acknowledgement.
    WithoutResponse,
}

/// One advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDevice {
    address: String,
    local_name: Option<String>,
    rssi: Option<i16>,
}

impl AdvertisedDevice {
    #[must_use]
    pub fn new(address: String, local_name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            address,
            local_name,
            rssi,
        }
    }

    /// Returns the hardware address as advertised.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Returns whether this advertisement came from `address`, ignoring case.
    #[must_use]
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

/// Scan parameters passed to [`ScaleTransport::start_scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    mode: ScanMode,
    adapter: Option<String>,
}

impl ScanRequest {
    #[must_use]
    pub fn new(mode: ScanMode, adapter: Option<String>) -> Self {
        Self { mode, adapter }
    }

    #[must_use]
    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Adapter name hint, if the caller asked for a specific adapter.
    #[must_use]
    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }
}

/// BLE central operations used by a scale session.
#[async_trait]
pub trait ScaleTransport: Send + Sync {
    /// Starts scanning and returns the advertisement stream.
    async fn start_scan(&self, request: &ScanRequest)
    -> Result<AdvertisementStream, InteractionError>;

    async fn stop_scan(&self) -> Result<(), InteractionError>;

    /// Connects to an advertised device and discovers its characteristics.
    async fn connect(
        &self,
        device: &AdvertisedDevice,
    ) -> Result<Box<dyn ScaleLink>, InteractionError>;
}

/// GATT operations on one connected scale.
#[async_trait]
pub trait ScaleLink: Send + Sync {
    async fn read(&self, endpoint: EndpointId) -> Result<Vec<u8>, InteractionError>;

    async fn write(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), InteractionError>;

    /// Enables notifications. The returned stream ends on disconnect.
    async fn subscribe(&self, endpoint: EndpointId) -> Result<NotificationStream, InteractionError>;

    async fn disconnect(&self) -> Result<(), InteractionError>;
}
