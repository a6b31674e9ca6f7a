use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bon::Builder;
use strum_macros::Display;
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::model::{ScaleModel, ScaleResult, ScanMode};
use super::state::{CommandKind, Measurement, OutboundCommand, ScaleProtocol, UnitPreference};
use crate::body_metrics::BodyProfile;
use crate::codec::Esf551Codec;
use crate::error::{ConfigError, InteractionError};
use crate::hw::{AdvertisedDevice, ScaleLink, ScaleTransport, ScanRequest, WriteMode};
use crate::protocol::{EndpointId, WeightUnit};
use crate::utils::format_hex;

/// Callback invoked once per stable measurement.
pub type ResultCallback = Arc<dyn Fn(ScaleResult) + Send + Sync>;

/// Settings for one scale session.
#[derive(Debug, Clone, Builder)]
pub struct ScaleConfig {
    /// Hardware address to connect to. Compared case-insensitively.
    #[builder(into)]
    address: String,
    model: ScaleModel,
    /// Unit to show on the scale. ESF-24 scales default to kilograms.
    display_unit: Option<WeightUnit>,
    #[builder(default)]
    scan_mode: ScanMode,
    /// Adapter name hint.
    #[builder(into)]
    adapter: Option<String>,
    /// Enables body-composition values in every result.
    body_profile: Option<BodyProfile>,
}

impl ScaleConfig {
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn model(&self) -> ScaleModel {
        self.model
    }

    #[must_use]
    pub fn display_unit(&self) -> Option<WeightUnit> {
        self.display_unit
    }

    #[must_use]
    pub fn scan_mode(&self) -> ScanMode {
        self.scan_mode
    }

    #[must_use]
    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }

    #[must_use]
    pub fn body_profile(&self) -> Option<&BodyProfile> {
        self.body_profile.as_ref()
    }
}

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Connecting,
    SettingUp,
    Notifying,
}

struct SessionState {
    phase: SessionPhase,
    link: Option<Arc<dyn ScaleLink>>,
    /// Bumped on every successful connect.
    connection: u64,
    hw_version: Option<String>,
    sw_version: Option<String>,
    units: UnitPreference,
    protocol: ScaleProtocol,
}

impl SessionState {
    fn enter_idle(&mut self) {
        self.phase = SessionPhase::Idle;
        self.link = None;
    }
}

struct SessionShared {
    config: ScaleConfig,
    transport: Arc<dyn ScaleTransport>,
    on_result: ResultCallback,
    state: Mutex<SessionState>,
}

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A session with one scale.
///
/// The session scans for the configured address, connects when it is seen,
/// runs the model's protocol over the notification stream and reports every
/// stable measurement to the result callback. It reconnects on the next
/// advertisement after a disconnect.
pub struct Scale {
    shared: Arc<SessionShared>,
    scan: AsyncMutex<Option<ScanTask>>,
}

impl Scale {
    /// Creates a session. Nothing happens on the radio until [`Scale::start`].
    pub fn new(
        config: ScaleConfig,
        transport: Arc<dyn ScaleTransport>,
        on_result: impl Fn(ScaleResult) + Send + Sync + 'static,
    ) -> Self {
        let requested = match config.model {
            ScaleModel::Esf551 => config.display_unit,
            ScaleModel::Esf24 => Some(config.display_unit.unwrap_or(WeightUnit::Kg)),
        };
        let state = SessionState {
            phase: SessionPhase::Idle,
            link: None,
            connection: 0,
            hw_version: None,
            sw_version: None,
            units: UnitPreference::new(requested),
            protocol: ScaleProtocol::for_model(config.model),
        };

        Self {
            shared: Arc::new(SessionShared {
                config,
                transport,
                on_result: Arc::new(on_result),
                state: Mutex::new(state),
            }),
            scan: AsyncMutex::new(None),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        self.shared.config.address()
    }

    #[must_use]
    pub fn model(&self) -> ScaleModel {
        self.shared.config.model()
    }

    /// Hardware revision, once read from the device. Kept across reconnects.
    #[must_use]
    pub fn hw_version(&self) -> Option<String> {
        self.shared.state().hw_version.clone()
    }

    /// Software revision from the most recent connection.
    #[must_use]
    pub fn sw_version(&self) -> Option<String> {
        self.shared.state().sw_version.clone()
    }

    /// The requested unit, or the unit the scale last reported when none was
    /// requested.
    #[must_use]
    pub fn display_unit(&self) -> Option<WeightUnit> {
        self.shared.state().units.effective()
    }

    /// Changes the requested display unit.
    ///
    /// On ESF-551 scales `None` adopts whatever the scale shows. ESF-24 scales
    /// cannot report their unit, so `None` is rejected there.
    pub fn set_display_unit(&self, unit: Option<WeightUnit>) -> Result<(), ConfigError> {
        let model = self.model();
        if unit.is_none() && !model.reports_display_unit() {
            return Err(ConfigError::DisplayUnitRequired { model });
        }
        self.shared.state().units.request(unit);
        debug!(?unit, "display unit requested");
        Ok(())
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.shared.state().phase
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state().link.is_some()
    }

    /// Starts scanning. Calling it while a scan is running does nothing.
    #[instrument(skip(self), fields(address = self.address(), model = %self.model()))]
    pub async fn start(&self) -> Result<(), InteractionError> {
        let mut scan = self.scan.lock().await;
        if scan.is_some() {
            debug!("scan already running");
            return Ok(());
        }

        let config = &self.shared.config;
        let request = ScanRequest::new(config.scan_mode, config.adapter.clone());
        let mut advertisements = self.shared.transport.start_scan(&request).await?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    maybe_device = advertisements.next() => match maybe_device {
                        Some(device) if device.matches_address(shared.config.address()) => {
                            let shared = Arc::clone(&shared);
                            tokio::spawn(async move { shared.handle_advertisement(device).await });
                        }
                        Some(device) => trace!(seen = device.address(), "ignoring advertisement"),
                        None => {
                            debug!("advertisement stream ended");
                            break;
                        }
                    },
                }
            }
        });

        *scan = Some(ScanTask { cancel, handle });
        info!(scan_mode = %config.scan_mode, "scanning for scale");
        Ok(())
    }

    /// Stops scanning. An open connection is left alone.
    #[instrument(skip(self), fields(address = self.address()))]
    pub async fn stop(&self) -> Result<(), InteractionError> {
        let Some(task) = self.scan.lock().await.take() else {
            return Ok(());
        };
        task.cancel.cancel();
        if let Err(error) = task.handle.await {
            warn!(%error, "scan task ended abnormally");
        }
        self.shared.transport.stop_scan().await?;
        info!("scan stopped");
        Ok(())
    }

    /// Disconnects the current link, if any.
    pub async fn disconnect(&self) -> Result<(), InteractionError> {
        let link = self.shared.state().link.clone();
        if let Some(link) = link {
            link.disconnect().await?;
        }
        Ok(())
    }

    /// Handles one advertisement as if the scan had produced it.
    ///
    /// Returns once the resulting connection ends, or immediately if the
    /// advertisement is for another device or a connection is already active.
    pub async fn handle_advertisement(&self, device: AdvertisedDevice) {
        self.shared.handle_advertisement(device).await;
    }
}

impl fmt::Debug for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scale")
            .field("address", &self.address())
            .field("model", &self.model())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl SessionShared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_connecting(&self) -> Result<(), SessionPhase> {
        let mut state = self.state();
        if state.phase != SessionPhase::Idle {
            return Err(state.phase);
        }
        state.phase = SessionPhase::Connecting;
        Ok(())
    }

    #[instrument(
        skip_all,
        fields(address = device.address(), model = %self.config.model)
    )]
    async fn handle_advertisement(self: &Arc<Self>, device: AdvertisedDevice) {
        if !device.matches_address(&self.config.address) {
            trace!("advertisement is for another device");
            return;
        }
        if let Err(phase) = self.begin_connecting() {
            debug!(%phase, "session already active");
            return;
        }

        info!(name = device.local_name(), rssi = device.rssi(), "connecting to scale");
        let link: Arc<dyn ScaleLink> = match self.transport.connect(&device).await {
            Ok(link) => Arc::from(link),
            Err(error) => {
                error!(%error, "failed to connect to scale");
                self.state().enter_idle();
                return;
            }
        };

        {
            let mut state = self.state();
            state.phase = SessionPhase::SettingUp;
            state.link = Some(Arc::clone(&link));
            state.connection = state.connection.wrapping_add(1);
            state.protocol.reset();
        }

        if self.config.model == ScaleModel::Esf551 {
            self.set_up_esf551(link.as_ref()).await;
        }

        let mut notifications = match link.subscribe(EndpointId::WeightNotify).await {
            Ok(notifications) => notifications,
            Err(error) => {
                error!(%error, "failed to subscribe to weight notifications");
                let mut state = self.state();
                state.enter_idle();
                state.units.rearm();
                return;
            }
        };

        self.state().phase = SessionPhase::Notifying;
        info!("listening for weight notifications");
        while let Some(payload) = notifications.next().await {
            self.handle_notification(&device, &payload);
        }

        info!("scale disconnected");
        self.state().enter_idle();
    }

    async fn set_up_esf551(&self, link: &dyn ScaleLink) {
        let hw_cached = self.state().hw_version.is_some();
        if !hw_cached {
            match link.read(EndpointId::HardwareRevision).await {
                Ok(raw) => {
                    let hw_version = revision_string(&raw);
                    debug!(%hw_version, "read hardware revision");
                    self.state().hw_version = Some(hw_version);
                }
                Err(error) => warn!(%error, "failed to read hardware revision"),
            }
        }

        match link.read(EndpointId::SoftwareRevision).await {
            Ok(raw) => {
                let sw_version = revision_string(&raw);
                debug!(%sw_version, "read software revision");
                self.state().sw_version = Some(sw_version);
            }
            Err(error) => warn!(%error, "failed to read software revision"),
        }

        let pending = self.state().units.pending_correction();
        if let Some(unit) = pending {
            let command = Esf551Codec::unit_change_command(unit);
            match link
                .write(EndpointId::CommandWrite, &command, WriteMode::WithoutResponse)
                .await
            {
                Ok(()) => {
                    let mut state = self.state();
                    state.units.correction_delivered();
                    state.protocol.unit_change_sent(unit);
                    info!(%unit, "display unit set");
                }
                Err(error) => error!(%error, %unit, "failed to set display unit"),
            }
        }
    }

    fn handle_notification(self: &Arc<Self>, device: &AdvertisedDevice, payload: &[u8]) {
        trace!(payload = %format_hex(payload), "notification received");

        let (commands, measurement, link, connection, hw_version, sw_version) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let outcome =
                state
                    .protocol
                    .handle_frame(payload, &mut state.units, OffsetDateTime::now_utc());
            let (commands, measurement) = outcome.into_parts();
            (
                commands,
                measurement,
                state.link.clone(),
                state.connection,
                state.hw_version.clone(),
                state.sw_version.clone(),
            )
        };

        for command in commands {
            self.dispatch(link.clone(), connection, command);
        }

        if let Some(measurement) = measurement {
            let result = self.build_result(device, measurement, hw_version, sw_version);
            info!(
                weight_kg = result.reading().weight_kg(),
                display_unit = %result.display_unit(),
                value_count = result.reading().len(),
                "stable measurement"
            );
            (self.on_result)(result);
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        link: Option<Arc<dyn ScaleLink>>,
        connection: u64,
        command: OutboundCommand,
    ) {
        let Some(link) = link else {
            warn!(kind = %command.kind(), "no link for outbound command");
            self.record_write_failure(connection, command.kind());
            return;
        };

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let written = link
                .write(EndpointId::CommandWrite, command.payload(), command.mode())
                .await;
            match written {
                Ok(()) => debug!(
                    kind = %command.kind(),
                    payload = %format_hex(command.payload()),
                    "command written"
                ),
                Err(error) => {
                    warn!(%error, kind = %command.kind(), "command write failed");
                    shared.record_write_failure(connection, command.kind());
                }
            }
        });
    }

    fn record_write_failure(&self, connection: u64, kind: CommandKind) {
        let mut state = self.state();
        if state.connection != connection {
            debug!(%kind, "ignoring write failure from an earlier connection");
            return;
        }
        state.protocol.command_failed(kind);
    }

    fn build_result(
        &self,
        device: &AdvertisedDevice,
        measurement: Measurement,
        hw_version: Option<String>,
        sw_version: Option<String>,
    ) -> ScaleResult {
        let (reading, display_unit) = measurement.into_parts();
        let reading = match (self.config.body_profile, reading.weight_kg()) {
            (Some(profile), Some(weight_kg)) => {
                let today = OffsetDateTime::now_utc().date();
                match reading.impedance() {
                    Some(impedance) => {
                        let metrics = profile.metrics_for(weight_kg, impedance, today);
                        reading.with_body_metrics(&metrics)
                    }
                    None => {
                        let metrics = profile.metrics_for(weight_kg, 0, today);
                        reading.with_anthropometrics(&metrics)
                    }
                }
            }
            _ => reading,
        };

        ScaleResult::new(
            device.local_name().map(str::to_string),
            device.address().to_string(),
            hw_version,
            sw_version,
            display_unit,
            reading,
        )
    }
}

fn revision_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
