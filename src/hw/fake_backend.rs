use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, instrument};

use super::transport::{
    AdvertisedDevice, AdvertisementStream, NotificationStream, ScaleLink, ScaleTransport,
    ScanRequest, WriteMode,
};
use crate::error::{FixtureError, InteractionError};
use crate::protocol::EndpointId;

/// Parsed `address|name;address|name` advertisement fixture. A name of `-`
/// means the device advertised none.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct AdvertisementFixture {
    devices: Vec<AdvertisedDevice>,
}

impl FromStr for AdvertisementFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(FixtureError::EmptyFixture);
        }
        let devices = value
            .split(';')
            .map(parse_advertisement_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { devices })
    }
}

/// Parsed comma-separated hex notification payloads.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct NotificationPayloads {
    payloads: Vec<Vec<u8>>,
}

impl FromStr for NotificationPayloads {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Ok(Self {
                payloads: Vec::new(),
            });
        }
        let payloads = value.split(',').map(parse_hex).collect::<Result<_, _>>()?;
        Ok(Self { payloads })
    }
}

/// One hex payload, e.g. `A5 02 00 10`.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct HexPayload {
    payload: Vec<u8>,
}

impl FromStr for HexPayload {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            payload: parse_hex(value)?,
        })
    }
}

fn parse_advertisement_record(raw_record: &str) -> Result<AdvertisedDevice, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    let [address, name] = fields.as_slice() else {
        return Err(FixtureError::InvalidRecordFieldCount);
    };
    if address.is_empty() || name.is_empty() {
        return Err(FixtureError::EmptyRecordField);
    }

    let local_name = (*name != "-").then(|| (*name).to_string());
    Ok(AdvertisedDevice::new((*address).to_string(), local_name, None))
}

fn parse_hex(raw_value: &str) -> Result<Vec<u8>, FixtureError> {
    let cleaned: String = raw_value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned)?)
}

/// Operations the fake transport can be told to fail.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FakeFailure {
    Connect,
    Read,
    Subscribe,
    Write,
}

impl FakeFailure {
    fn operation(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Subscribe => "subscribe",
            Self::Write => "write",
        }
    }
}

/// Everything the fake transport was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeActivity {
    scans_started: usize,
    scans_stopped: usize,
    connects: usize,
    reads: Vec<EndpointId>,
    writes: Vec<(EndpointId, Vec<u8>, WriteMode)>,
    failed_writes: Vec<Vec<u8>>,
    subscriptions: usize,
    disconnects: usize,
}

impl FakeActivity {
    #[must_use]
    pub fn scans_started(&self) -> usize {
        self.scans_started
    }

    #[must_use]
    pub fn scans_stopped(&self) -> usize {
        self.scans_stopped
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects
    }

    #[must_use]
    pub fn reads(&self) -> &[EndpointId] {
        &self.reads
    }

    /// Successful writes in the order they completed.
    #[must_use]
    pub fn writes(&self) -> &[(EndpointId, Vec<u8>, WriteMode)] {
        &self.writes
    }

    /// Payloads of writes rejected by an injected [`FakeFailure::Write`].
    #[must_use]
    pub fn failed_writes(&self) -> &[Vec<u8>] {
        &self.failed_writes
    }

    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.subscriptions
    }

    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.disconnects
    }
}

/// Shared handle for inspecting what a [`FakeTransport`] has done.
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    activity: Arc<Mutex<FakeActivity>>,
}

impl FakeProbe {
    /// Returns a snapshot of the recorded activity.
    #[must_use]
    pub fn activity(&self) -> FakeActivity {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeActivity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Feeds notifications into a live fake connection. Dropping it disconnects.
#[derive(Debug)]
pub struct FakeNotifier {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl FakeNotifier {
    /// Delivers one notification. Returns `false` once the link is gone.
    pub fn notify(&self, payload: impl Into<Vec<u8>>) -> bool {
        self.sender.send(payload.into()).is_ok()
    }
}

#[derive(Debug)]
enum FakeSession {
    Scripted(Vec<Vec<u8>>),
    Live(mpsc::UnboundedReceiver<Vec<u8>>),
}

/// In-memory transport that replays scripted advertisements and notifications.
///
/// Each connection consumes the next queued session. Once the queue is empty,
/// connections succeed but disconnect as soon as they subscribe.
#[derive(Debug)]
pub struct FakeTransport {
    advertisements: Vec<AdvertisedDevice>,
    sessions: Mutex<VecDeque<FakeSession>>,
    hardware_version: Option<String>,
    software_version: Option<String>,
    failures: Arc<HashSet<FakeFailure>>,
    probe: FakeProbe,
}

impl FakeTransport {
    #[must_use]
    pub fn new(advertisements: Vec<AdvertisedDevice>) -> Self {
        Self {
            advertisements,
            sessions: Mutex::new(VecDeque::new()),
            hardware_version: None,
            software_version: None,
            failures: Arc::new(HashSet::new()),
            probe: FakeProbe::default(),
        }
    }

    /// Sets the revision strings returned by the device-information reads.
    #[must_use]
    pub fn with_versions(
        mut self,
        hardware_version: Option<String>,
        software_version: Option<String>,
    ) -> Self {
        self.hardware_version = hardware_version;
        self.software_version = software_version;
        self
    }

    /// Queues a connection that delivers `notifications` and then disconnects.
    #[must_use]
    pub fn with_session(self, notifications: Vec<Vec<u8>>) -> Self {
        self.push_session(FakeSession::Scripted(notifications));
        self
    }

    /// Queues a connection whose notifications come from the returned notifier.
    #[must_use]
    pub fn with_live_session(self) -> (Self, FakeNotifier) {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.push_session(FakeSession::Live(receiver));
        (self, FakeNotifier { sender })
    }

    #[must_use]
    pub fn with_failure(mut self, failure: FakeFailure) -> Self {
        let mut failures = (*self.failures).clone();
        failures.insert(failure);
        self.failures = Arc::new(failures);
        self
    }

    #[must_use]
    pub fn probe(&self) -> FakeProbe {
        self.probe.clone()
    }

    fn push_session(&self, session: FakeSession) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(session);
    }

    fn next_session(&self) -> FakeSession {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(FakeSession::Scripted(Vec::new()))
    }
}

fn check(failures: &HashSet<FakeFailure>, failure: FakeFailure) -> Result<(), InteractionError> {
    if failures.contains(&failure) {
        return Err(InteractionError::FakeTransport {
            operation: failure.operation(),
        });
    }
    Ok(())
}

#[async_trait]
impl ScaleTransport for FakeTransport {
    #[instrument(skip(self), level = "debug")]
    async fn start_scan(
        &self,
        request: &ScanRequest,
    ) -> Result<AdvertisementStream, InteractionError> {
        self.probe.lock().scans_started += 1;
        debug!(
            mode = %request.mode(),
            advertisement_count = self.advertisements.len(),
            "replaying fake advertisements"
        );
        Ok(Box::pin(tokio_stream::iter(self.advertisements.clone())))
    }

    async fn stop_scan(&self) -> Result<(), InteractionError> {
        self.probe.lock().scans_stopped += 1;
        Ok(())
    }

    #[instrument(skip(self, device), level = "debug", fields(address = device.address()))]
    async fn connect(
        &self,
        device: &AdvertisedDevice,
    ) -> Result<Box<dyn ScaleLink>, InteractionError> {
        tokio::task::yield_now().await;
        self.probe.lock().connects += 1;
        check(&self.failures, FakeFailure::Connect)?;

        Ok(Box::new(FakeLink {
            session: Mutex::new(Some(self.next_session())),
            hardware_version: self.hardware_version.clone(),
            software_version: self.software_version.clone(),
            failures: Arc::clone(&self.failures),
            probe: self.probe.clone(),
        }))
    }
}

#[derive(Debug)]
struct FakeLink {
    session: Mutex<Option<FakeSession>>,
    hardware_version: Option<String>,
    software_version: Option<String>,
    failures: Arc<HashSet<FakeFailure>>,
    probe: FakeProbe,
}

#[async_trait]
impl ScaleLink for FakeLink {
    async fn read(&self, endpoint: EndpointId) -> Result<Vec<u8>, InteractionError> {
        self.probe.lock().reads.push(endpoint);
        check(&self.failures, FakeFailure::Read)?;

        let value = match endpoint {
            EndpointId::HardwareRevision => self.hardware_version.as_ref(),
            EndpointId::SoftwareRevision => self.software_version.as_ref(),
            EndpointId::WeightNotify | EndpointId::CommandWrite => None,
        };
        value
            .map(|value| value.as_bytes().to_vec())
            .ok_or(InteractionError::MissingEndpoint { endpoint })
    }

    async fn write(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), InteractionError> {
        tokio::task::yield_now().await;
        if let Err(error) = check(&self.failures, FakeFailure::Write) {
            self.probe.lock().failed_writes.push(payload.to_vec());
            return Err(error);
        }
        self.probe
            .lock()
            .writes
            .push((endpoint, payload.to_vec(), mode));
        Ok(())
    }

    async fn subscribe(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, InteractionError> {
        check(&self.failures, FakeFailure::Subscribe)?;
        if endpoint != EndpointId::WeightNotify {
            return Err(InteractionError::MissingEndpoint { endpoint });
        }
        self.probe.lock().subscriptions += 1;

        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let stream: NotificationStream = match session {
            Some(FakeSession::Scripted(payloads)) => Box::pin(tokio_stream::iter(payloads)),
            Some(FakeSession::Live(receiver)) => Box::pin(UnboundedReceiverStream::new(receiver)),
            None => Box::pin(tokio_stream::empty()),
        };
        Ok(stream)
    }

    async fn disconnect(&self) -> Result<(), InteractionError> {
        self.probe.lock().disconnects += 1;
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tokio_stream::StreamExt;

    use super::*;

    #[rstest]
    #[case("AA:BB:CC:DD:EE:FF|Etekcity Fitness Scale", 1)]
    #[case("AA:BB:CC:DD:EE:FF|-;11:22:33:44:55:66|QN-Scale", 2)]
    fn advertisement_fixture_parses_records(#[case] fixture: &str, #[case] expected_count: usize) {
        let parsed: AdvertisementFixture = fixture.parse().expect("fixture parses");
        let devices: Vec<AdvertisedDevice> = parsed.into();
        assert_eq!(expected_count, devices.len());
    }

    #[test]
    fn advertisement_fixture_maps_dash_to_missing_name() {
        let parsed: AdvertisementFixture = "AA:BB|-".parse().expect("fixture parses");
        let devices: Vec<AdvertisedDevice> = parsed.into();
        assert_eq!(None, devices[0].local_name());
    }

    #[rstest]
    #[case("", FixtureError::EmptyFixture)]
    #[case("AA:BB", FixtureError::InvalidRecordFieldCount)]
    #[case("AA:BB|name|extra", FixtureError::InvalidRecordFieldCount)]
    #[case("|name", FixtureError::EmptyRecordField)]
    fn advertisement_fixture_rejects_malformed_records(
        #[case] fixture: &str,
        #[case] expected: FixtureError,
    ) {
        let error = fixture
            .parse::<AdvertisementFixture>()
            .expect_err("fixture is malformed");
        assert_eq!(expected.to_string(), error.to_string());
    }

    #[test]
    fn notification_payloads_parse_hex_with_whitespace() {
        let parsed: NotificationPayloads = "A5 02 00, 10 0b 15".parse().expect("payloads parse");
        let payloads: Vec<Vec<u8>> = parsed.into();
        assert_eq!(vec![vec![0xA5, 0x02, 0x00], vec![0x10, 0x0B, 0x15]], payloads);
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        assert_matches!(parse_hex("ABC"), Err(FixtureError::InvalidHex(_)));
    }

    #[tokio::test]
    async fn sessions_are_consumed_in_order() -> anyhow::Result<()> {
        let device = AdvertisedDevice::new("AA".into(), None, None);
        let transport = FakeTransport::new(vec![device.clone()])
            .with_session(vec![vec![0x01]])
            .with_session(vec![vec![0x02], vec![0x03]]);

        let first: Vec<Vec<u8>> = transport
            .connect(&device)
            .await?
            .subscribe(EndpointId::WeightNotify)
            .await?
            .collect()
            .await;
        let second: Vec<Vec<u8>> = transport
            .connect(&device)
            .await?
            .subscribe(EndpointId::WeightNotify)
            .await?
            .collect()
            .await;
        let third: Vec<Vec<u8>> = transport
            .connect(&device)
            .await?
            .subscribe(EndpointId::WeightNotify)
            .await?
            .collect()
            .await;

        assert_eq!(vec![vec![0x01]], first);
        assert_eq!(vec![vec![0x02], vec![0x03]], second);
        assert!(third.is_empty());
        assert_eq!(3, transport.probe().activity().connects());
        Ok(())
    }

    #[tokio::test]
    async fn injected_failures_surface_as_fake_transport_errors() -> anyhow::Result<()> {
        let device = AdvertisedDevice::new("AA".into(), None, None);
        let transport = FakeTransport::new(vec![device.clone()])
            .with_failure(FakeFailure::Write)
            .with_failure(FakeFailure::Read);

        let link = transport.connect(&device).await?;
        assert_matches!(
            link.write(EndpointId::CommandWrite, &[0x01], WriteMode::WithResponse)
                .await,
            Err(InteractionError::FakeTransport { operation: "write" })
        );
        assert_matches!(
            link.read(EndpointId::SoftwareRevision).await,
            Err(InteractionError::FakeTransport { operation: "read" })
        );
        let activity = transport.probe().activity();
        assert!(activity.writes().is_empty());
        assert_eq!(&[vec![0x01]], activity.failed_writes());
        Ok(())
    }

    #[tokio::test]
    async fn live_session_ends_when_notifier_drops() -> anyhow::Result<()> {
        let device = AdvertisedDevice::new("AA".into(), None, None);
        let (transport, notifier) = FakeTransport::new(vec![device.clone()]).with_live_session();

        let mut stream = transport
            .connect(&device)
            .await?
            .subscribe(EndpointId::WeightNotify)
            .await?;
        assert!(notifier.notify(vec![0x07]));
        assert_eq!(Some(vec![0x07]), stream.next().await);
        drop(notifier);
        assert_eq!(None, stream.next().await);
        Ok(())
    }
}
