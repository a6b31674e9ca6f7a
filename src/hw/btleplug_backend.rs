use std::collections::HashMap;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, trace, warn};

use super::transport::{
    AdvertisedDevice, AdvertisementStream, NotificationStream, ScaleLink, ScaleTransport,
    ScanRequest, WriteMode,
};
use crate::error::InteractionError;
use crate::protocol::{self, EndpointId};
use crate::scale::ScanMode;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transport backed by `btleplug`.
#[derive(Debug)]
pub struct BtleplugTransport {
    adapter: Adapter,
}

impl BtleplugTransport {
    /// Opens the first adapter, or the first whose description contains
    /// `adapter_hint`.
    #[instrument(level = "debug")]
    pub async fn new(adapter_hint: Option<&str>) -> Result<Self, InteractionError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(InteractionError::NoAdapters);
        }

        for adapter in adapters {
            let info = adapter.adapter_info().await?;
            let selected = adapter_hint.is_none_or(|hint| info.contains(hint));
            if selected {
                info!(adapter = %info, "using BLE adapter");
                return Ok(Self { adapter });
            }
            trace!(adapter = %info, "skipping BLE adapter");
        }

        Err(InteractionError::AdapterNotFound {
            hint: adapter_hint.unwrap_or_default().to_string(),
        })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, InteractionError> {
        self.adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|peripheral| peripheral.address().to_string().eq_ignore_ascii_case(address))
            .ok_or_else(|| InteractionError::DeviceNotFound {
                address: address.to_string(),
            })
    }
}

#[async_trait]
impl ScaleTransport for BtleplugTransport {
    #[instrument(skip(self), level = "debug")]
    async fn start_scan(
        &self,
        request: &ScanRequest,
    ) -> Result<AdvertisementStream, InteractionError> {
        if request.mode() == ScanMode::Passive {
            warn!("passive scanning is not available through btleplug; scanning actively");
        }

        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let peripheral = match adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral,
                    Err(error) => {
                        trace!(?error, "advertising peripheral vanished");
                        continue;
                    }
                };
                let properties = match peripheral.properties().await {
                    Ok(properties) => properties.unwrap_or_default(),
                    Err(error) => {
                        trace!(?error, "failed to read advertisement properties");
                        continue;
                    }
                };

                let device = AdvertisedDevice::new(
                    peripheral.address().to_string(),
                    properties.local_name,
                    properties.rssi,
                );
                if sender.send(device).await.is_err() {
                    break;
                }
            }
            debug!("advertisement forwarding stopped");
        });

        Ok(Box::pin(ReceiverStream::new(receiver)))
    }

    async fn stop_scan(&self) -> Result<(), InteractionError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    #[instrument(skip(self, device), level = "debug", fields(address = device.address()))]
    async fn connect(
        &self,
        device: &AdvertisedDevice,
    ) -> Result<Box<dyn ScaleLink>, InteractionError> {
        let peripheral = self.find_peripheral(device.address()).await?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let characteristics: HashMap<EndpointId, Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .filter_map(|characteristic| {
                protocol::endpoint_for_uuid(&characteristic.uuid.to_string())
                    .map(|endpoint| (endpoint, characteristic))
            })
            .collect();
        debug!(
            endpoint_count = characteristics.len(),
            "resolved scale characteristics"
        );

        Ok(Box::new(BtleplugLink {
            adapter: self.adapter.clone(),
            peripheral,
            characteristics,
        }))
    }
}

#[derive(Debug)]
struct BtleplugLink {
    adapter: Adapter,
    peripheral: Peripheral,
    characteristics: HashMap<EndpointId, Characteristic>,
}

impl BtleplugLink {
    fn characteristic_for(
        &self,
        endpoint: EndpointId,
    ) -> Result<&Characteristic, InteractionError> {
        self.characteristics
            .get(&endpoint)
            .ok_or(InteractionError::MissingEndpoint { endpoint })
    }
}

#[async_trait]
impl ScaleLink for BtleplugLink {
    #[instrument(skip(self), level = "trace", fields(?endpoint))]
    async fn read(&self, endpoint: EndpointId) -> Result<Vec<u8>, InteractionError> {
        let characteristic = self.characteristic_for(endpoint)?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    #[instrument(
        skip(self, payload),
        level = "trace",
        fields(?endpoint, ?mode, payload_len = payload.len())
    )]
    async fn write(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), InteractionError> {
        let characteristic = self.characteristic_for(endpoint)?;
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(characteristic, payload, write_type)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(?endpoint))]
    async fn subscribe(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, InteractionError> {
        let characteristic = self.characteristic_for(endpoint)?.clone();
        let mut notifications = self.peripheral.notifications().await?;
        let mut events = self.adapter.events().await?;
        self.peripheral.subscribe(&characteristic).await?;

        let peripheral_id = self.peripheral.id();
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_notification = notifications.next() => match maybe_notification {
                        Some(notification) if notification.uuid == characteristic.uuid => {
                            if sender.send(notification.value).await.is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                    maybe_event = events.next() => match maybe_event {
                        Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                            info!("scale disconnected");
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    },
                    () = sender.closed() => break,
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(receiver)))
    }

    #[instrument(skip(self), level = "debug")]
    async fn disconnect(&self) -> Result<(), InteractionError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}
