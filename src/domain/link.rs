//! Light Link State Machine
//!
//! [`LinkController`] owns the only connection context in the process. Transport callbacks
//! and UI commands reach it through one inbound queue ([`LinkInput`]) and are handled one
//! at a time, so a brightness request is always checked against the current state and
//! never against a stale "Ready".
//!
//! ```text
//! Idle -> Scanning -> Connecting -> DiscoveringServices -> Ready
//!            ^                                               |
//!            +------------- Disconnected <--------------------+
//! ```

use crate::domain::brightness::{BrightnessValue, BrightnessWriter, WriteOrigin, WriteOutcome};
use crate::domain::matcher::DeviceMatcher;
use crate::domain::models::{
    CharacteristicId, LinkNotice, LinkPhase, MessageSeverity, PeripheralId, PeripheralIdentity,
    ServiceTree, StatusMessage,
};
use crate::domain::protocol::{LIGHT_CHARACTERISTIC, LIGHT_SERVICE};
use crate::domain::transport::{ConnectionState, Transport, TransportError, TransportEvent};
use std::ops::ControlFlow;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

pub const BLUETOOTH_OFF_TEXT: &str = "Bluetooth is turned off. Enable it and press Retry.";
pub const SERVICE_MISSING_TEXT: &str = "Light service not found, searching again...";

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to start the light link worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("light link worker is not running")]
    WorkerStopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Begin discovery. Ignored unless the link is Idle.
    Start,
    SetBrightness {
        value: BrightnessValue,
        origin: WriteOrigin,
    },
    Shutdown,
}

/// One item of the link worker's inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkInput {
    Transport(TransportEvent),
    Command(LinkCommand),
}

/// Connection context. Per-connection data lives inside the variant that needs it, so
/// leaving a connected state drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkState {
    Idle,
    Scanning,
    Connecting {
        peripheral: PeripheralIdentity,
    },
    DiscoveringServices {
        peripheral: PeripheralIdentity,
    },
    Ready {
        peripheral: PeripheralIdentity,
        characteristic: CharacteristicId,
    },
}

impl LinkState {
    fn phase(&self) -> LinkPhase {
        match self {
            Self::Idle => LinkPhase::Idle,
            Self::Scanning => LinkPhase::Scanning,
            Self::Connecting { .. } => LinkPhase::Connecting,
            Self::DiscoveringServices { .. } => LinkPhase::DiscoveringServices,
            Self::Ready { .. } => LinkPhase::Ready,
        }
    }

    /// The peripheral a connection attempt is in flight (or established) for.
    fn claimed(&self) -> Option<&PeripheralIdentity> {
        match self {
            Self::Connecting { peripheral }
            | Self::DiscoveringServices { peripheral }
            | Self::Ready { peripheral, .. } => Some(peripheral),
            Self::Idle | Self::Scanning => None,
        }
    }
}

pub struct LinkController<T: Transport> {
    transport: T,
    state: LinkState,
    matcher: DeviceMatcher,
    notices: mpsc::UnboundedSender<LinkNotice>,
    published: LinkPhase,
}

impl<T: Transport> LinkController<T> {
    pub fn new(transport: T, notices: mpsc::UnboundedSender<LinkNotice>) -> Self {
        Self {
            transport,
            state: LinkState::Idle,
            matcher: DeviceMatcher::light(),
            notices,
            published: LinkPhase::Idle,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.state.phase()
    }

    /// True while a matching peripheral is being connected to or is connected.
    pub fn has_claimed_peripheral(&self) -> bool {
        self.state.claimed().is_some()
    }

    /// The read-only view handed to the brightness writer.
    pub fn ready_characteristic(&self) -> Option<CharacteristicId> {
        match &self.state {
            LinkState::Ready { characteristic, .. } => Some(*characteristic),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Drains `inbox` until a `Shutdown` command arrives or every sender is gone.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<LinkInput>) {
        info!("Light link worker started");
        while let Some(input) = inbox.recv().await {
            if self.handle(input).is_break() {
                break;
            }
        }
        self.shutdown();
        info!("Light link worker stopped");
    }

    pub fn handle(&mut self, input: LinkInput) -> ControlFlow<()> {
        match input {
            LinkInput::Command(LinkCommand::Start) => self.start(),
            LinkInput::Command(LinkCommand::SetBrightness { value, origin }) => {
                self.set_brightness(value, origin)
            }
            LinkInput::Command(LinkCommand::Shutdown) => return ControlFlow::Break(()),
            LinkInput::Transport(TransportEvent::ScanResult(identity)) => {
                self.on_scan_result(identity)
            }
            LinkInput::Transport(TransportEvent::ConnectionStateChanged { peripheral, state }) => {
                self.on_connection_state(peripheral, state)
            }
            LinkInput::Transport(TransportEvent::ServicesDiscovered {
                peripheral,
                services,
            }) => self.on_services_discovered(peripheral, &services),
        }
        ControlFlow::Continue(())
    }

    fn start(&mut self) {
        if self.state != LinkState::Idle {
            debug!("Start ignored, link is {}", self.phase());
            return;
        }
        self.begin_scan();
    }

    fn begin_scan(&mut self) {
        if !self.transport.is_enabled() {
            warn!("Bluetooth radio is off, waiting for the user to enable it");
            self.set_state(LinkState::Idle);
            self.report(MessageSeverity::Warning, BLUETOOTH_OFF_TEXT);
            return;
        }

        match self.transport.start_scan() {
            Ok(()) => {
                info!("Scanning for \"{}\"", self.matcher.target());
                self.set_state(LinkState::Scanning);
            }
            Err(e) => {
                self.set_state(LinkState::Idle);
                self.on_transport_error("scan", e);
            }
        }
    }

    fn on_scan_result(&mut self, identity: PeripheralIdentity) {
        if !self.matcher.matches(&identity.name) {
            trace!("Ignoring advertisement from {} ({:?})", identity.id, identity.name);
            return;
        }
        if self.state != LinkState::Scanning {
            debug!(
                "Ignoring advertisement from {}, link is {}",
                identity.id,
                self.phase()
            );
            return;
        }

        info!("Found {} at {}, connecting", identity.name, identity.id);
        // Stop before connecting so a second advertisement can never start another attempt.
        if let Err(e) = self.transport.stop_scan() {
            warn!("Failed to stop scan: {}", e);
        }
        self.report(MessageSeverity::Info, format!("Found {}", identity.name));

        let result = self.transport.connect(&identity);
        self.set_state(LinkState::Connecting {
            peripheral: identity,
        });
        if let Err(e) = result {
            self.abandon_link("connect", e);
        }
    }

    fn on_connection_state(&mut self, peripheral: PeripheralId, state: ConnectionState) {
        if self.state.claimed().map(|p| p.id) != Some(peripheral) {
            debug!("Ignoring {:?} for unclaimed peripheral {}", state, peripheral);
            return;
        }

        match state {
            ConnectionState::Connected => {
                let LinkState::Connecting { peripheral } = &self.state else {
                    debug!("Duplicate connected event while {}", self.phase());
                    return;
                };
                let peripheral = peripheral.clone();
                info!("Connected to {}, discovering services", peripheral.id);

                let result = self.transport.discover_services();
                self.set_state(LinkState::DiscoveringServices { peripheral });
                if let Err(e) = result {
                    self.abandon_link("service discovery", e);
                }
            }
            ConnectionState::Disconnected => self.drop_link(),
        }
    }

    fn on_services_discovered(&mut self, peripheral: PeripheralId, services: &ServiceTree) {
        let LinkState::DiscoveringServices { peripheral: claimed } = &self.state else {
            debug!("Ignoring discovery result while {}", self.phase());
            return;
        };
        if claimed.id != peripheral {
            debug!("Ignoring discovery result for stale peripheral {}", peripheral);
            return;
        }
        let claimed = claimed.clone();

        match services.resolve(LIGHT_SERVICE, LIGHT_CHARACTERISTIC) {
            Some(characteristic) => {
                info!(
                    "Light ready: service {} characteristic {}",
                    LIGHT_SERVICE, characteristic
                );
                let message = format!("Connected to {}", claimed.name);
                self.set_state(LinkState::Ready {
                    peripheral: claimed,
                    characteristic,
                });
                self.report(MessageSeverity::Success, message);
            }
            None if services.is_empty() => {
                warn!("No services discovered on {}, dropping link", claimed.id);
                self.report(MessageSeverity::Warning, SERVICE_MISSING_TEXT);
                self.drop_link();
            }
            None => {
                warn!(
                    "Service {} / characteristic {} missing on {} ({} services), dropping link",
                    LIGHT_SERVICE,
                    LIGHT_CHARACTERISTIC,
                    claimed.id,
                    services.len()
                );
                self.report(MessageSeverity::Warning, SERVICE_MISSING_TEXT);
                self.drop_link();
            }
        }
    }

    fn set_brightness(&mut self, value: BrightnessValue, origin: WriteOrigin) {
        let ready = self.ready_characteristic();
        let outcome = BrightnessWriter::write(&mut self.transport, ready, value);
        self.label(outcome.label(value));

        match outcome {
            WriteOutcome::Sent => {}
            WriteOutcome::NotReady => {
                // A committed value while nothing is claimed restarts discovery. With an
                // attempt in flight a rescan would break the single-attempt rule.
                if origin == WriteOrigin::Commit && !self.has_claimed_peripheral() {
                    info!("Brightness committed while disconnected, restarting scan");
                    self.begin_scan();
                }
            }
            WriteOutcome::Failed(e) => {
                warn!("Brightness {} not delivered", value);
                self.on_transport_error("write", e);
            }
        }
    }

    /// Handles a lost link: clear every per-connection handle and scan again.
    fn on_link_lost(&mut self) {
        if let Some(peripheral) = self.state.claimed() {
            info!("Link to {} lost, rescanning", peripheral.id);
        }
        self.state = LinkState::Idle;
        self.publish(LinkPhase::Disconnected);
        self.begin_scan();
    }

    /// Releases the transport's link handles, then rescans.
    fn drop_link(&mut self) {
        if let Err(e) = self.transport.disconnect() {
            debug!("Releasing the link returned {}", e);
        }
        self.on_link_lost();
    }

    fn abandon_link(&mut self, operation: &str, error: TransportError) {
        let fatal = error == TransportError::PermissionDenied;
        self.on_transport_error(operation, error);
        if fatal {
            let _ = self.transport.disconnect();
            self.set_state(LinkState::Idle);
        } else {
            self.drop_link();
        }
    }

    fn on_transport_error(&mut self, operation: &str, error: TransportError) {
        match error {
            TransportError::PermissionDenied => {
                error!("Bluetooth {} denied by the system", operation);
                let _ = self.notices.send(LinkNotice::Fatal(
                    "Bluetooth permission denied. Allow Bluetooth access and restart."
                        .to_string(),
                ));
            }
            TransportError::Disabled => {
                warn!("Bluetooth {} failed: radio is off", operation);
                self.report(MessageSeverity::Warning, BLUETOOTH_OFF_TEXT);
            }
            other => {
                warn!("Bluetooth {} failed: {}", operation, other);
                self.report(
                    MessageSeverity::Error,
                    format!("Bluetooth {operation} failed: {other}"),
                );
            }
        }
    }

    fn shutdown(&mut self) {
        let result = match &self.state {
            LinkState::Idle => Ok(()),
            LinkState::Scanning => self.transport.stop_scan(),
            _ => self.transport.disconnect(),
        };
        if let Err(e) = result {
            debug!("Error while shutting the link down: {}", e);
        }
        self.set_state(LinkState::Idle);
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state.phase() != state.phase() {
            debug!("Link {} -> {}", self.state.phase(), state.phase());
        }
        self.state = state;
        self.publish(self.state.phase());
    }

    fn publish(&mut self, phase: LinkPhase) {
        if self.published != phase {
            self.published = phase;
            let _ = self.notices.send(LinkNotice::Phase(phase));
        }
    }

    fn report(&self, severity: MessageSeverity, message: impl Into<String>) {
        let _ = self.notices.send(LinkNotice::Status(StatusMessage {
            message: message.into(),
            severity,
        }));
    }

    fn label(&self, text: String) {
        let _ = self.notices.send(LinkNotice::BrightnessLabel(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::brightness::NOT_CONNECTED_TEXT;
    use crate::domain::models::{DiscoveredService, ServiceId};
    use crate::domain::protocol::LIGHT_DEVICE_NAME;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        StartScan,
        StopScan,
        Connect(PeripheralId),
        DiscoverServices,
        Write(CharacteristicId, Vec<u8>),
        Disconnect,
    }

    #[derive(Default)]
    struct RecordingTransport {
        disabled: bool,
        fail_connect: Option<TransportError>,
        fail_scan: Option<TransportError>,
        fail_write: Option<TransportError>,
        calls: Vec<Call>,
    }

    impl RecordingTransport {
        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }

        fn writes(&self) -> Vec<&[u8]> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Write(_, payload) => Some(payload.as_slice()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn is_enabled(&self) -> bool {
            !self.disabled
        }

        fn start_scan(&mut self) -> Result<(), TransportError> {
            self.calls.push(Call::StartScan);
            self.fail_scan.clone().map_or(Ok(()), Err)
        }

        fn stop_scan(&mut self) -> Result<(), TransportError> {
            self.calls.push(Call::StopScan);
            Ok(())
        }

        fn connect(&mut self, peripheral: &PeripheralIdentity) -> Result<(), TransportError> {
            self.calls.push(Call::Connect(peripheral.id));
            self.fail_connect.take().map_or(Ok(()), Err)
        }

        fn discover_services(&mut self) -> Result<(), TransportError> {
            self.calls.push(Call::DiscoverServices);
            Ok(())
        }

        fn write_characteristic(
            &mut self,
            characteristic: CharacteristicId,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            self.calls.push(Call::Write(characteristic, payload.to_vec()));
            self.fail_write.clone().map_or(Ok(()), Err)
        }

        fn disconnect(&mut self) -> Result<(), TransportError> {
            self.calls.push(Call::Disconnect);
            Ok(())
        }
    }

    const LIGHT: PeripheralId = PeripheralId(0xA1);

    fn light() -> PeripheralIdentity {
        PeripheralIdentity {
            id: LIGHT,
            name: LIGHT_DEVICE_NAME.to_string(),
        }
    }

    fn light_services() -> ServiceTree {
        ServiceTree::new(vec![
            DiscoveredService {
                id: ServiceId(Uuid::from_u128(0x1800)),
                characteristics: vec![CharacteristicId(Uuid::from_u128(0x2a00))],
            },
            DiscoveredService {
                id: LIGHT_SERVICE,
                characteristics: vec![LIGHT_CHARACTERISTIC],
            },
        ])
    }

    fn controller(
        transport: RecordingTransport,
    ) -> (
        LinkController<RecordingTransport>,
        mpsc::UnboundedReceiver<LinkNotice>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LinkController::new(transport, tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LinkNotice>) -> Vec<LinkNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    fn scan(link: &mut LinkController<RecordingTransport>, identity: PeripheralIdentity) {
        let _ = link.handle(LinkInput::Transport(TransportEvent::ScanResult(identity)));
    }

    fn connection(link: &mut LinkController<RecordingTransport>, state: ConnectionState) {
        let _ = link.handle(LinkInput::Transport(
            TransportEvent::ConnectionStateChanged {
                peripheral: LIGHT,
                state,
            },
        ));
    }

    fn discovered(link: &mut LinkController<RecordingTransport>, services: ServiceTree) {
        let _ = link.handle(LinkInput::Transport(TransportEvent::ServicesDiscovered {
            peripheral: LIGHT,
            services,
        }));
    }

    fn brightness(link: &mut LinkController<RecordingTransport>, value: u8, origin: WriteOrigin) {
        let _ = link.handle(LinkInput::Command(LinkCommand::SetBrightness {
            value: BrightnessValue::new(value),
            origin,
        }));
    }

    fn ready_link() -> (
        LinkController<RecordingTransport>,
        mpsc::UnboundedReceiver<LinkNotice>,
    ) {
        let (mut link, mut rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        scan(&mut link, light());
        connection(&mut link, ConnectionState::Connected);
        discovered(&mut link, light_services());
        assert_eq!(link.phase(), LinkPhase::Ready);
        drain(&mut rx);
        (link, rx)
    }

    #[test]
    fn test_start_begins_scanning() {
        let (mut link, mut rx) = controller(RecordingTransport::default());
        assert_eq!(link.phase(), LinkPhase::Idle);

        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert_eq!(link.transport().calls, vec![Call::StartScan]);
        assert_eq!(drain(&mut rx), vec![LinkNotice::Phase(LinkPhase::Scanning)]);

        // A second start while active is a no-op
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        assert_eq!(link.transport().count(&Call::StartScan), 1);
    }

    #[test]
    fn test_start_with_radio_off_stays_idle() {
        let (mut link, mut rx) = controller(RecordingTransport {
            disabled: true,
            ..Default::default()
        });

        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        assert_eq!(link.phase(), LinkPhase::Idle);
        assert!(link.transport().calls.is_empty());
        assert!(drain(&mut rx).iter().any(|n| matches!(
            n,
            LinkNotice::Status(StatusMessage { message, severity: MessageSeverity::Warning })
                if message == BLUETOOTH_OFF_TEXT
        )));
    }

    #[test]
    fn test_permission_denied_is_fatal() {
        let (mut link, mut rx) = controller(RecordingTransport {
            fail_scan: Some(TransportError::PermissionDenied),
            ..Default::default()
        });

        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        assert_eq!(link.phase(), LinkPhase::Idle);
        assert!(drain(&mut rx)
            .iter()
            .any(|n| matches!(n, LinkNotice::Fatal(_))));
    }

    #[test]
    fn test_matching_result_connects_and_stops_scan_once() {
        let (mut link, _rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));

        scan(
            &mut link,
            PeripheralIdentity {
                id: PeripheralId(0xB2),
                name: "esp32c3 light".to_string(),
            },
        );
        assert_eq!(link.phase(), LinkPhase::Scanning);

        scan(&mut link, light());
        assert_eq!(link.phase(), LinkPhase::Connecting);
        assert!(link.has_claimed_peripheral());

        // Later advertisements, even from another matching device, are ignored
        scan(&mut link, light());
        scan(
            &mut link,
            PeripheralIdentity {
                id: PeripheralId(0xC3),
                name: LIGHT_DEVICE_NAME.to_string(),
            },
        );

        assert_eq!(
            link.transport().calls,
            vec![Call::StartScan, Call::StopScan, Call::Connect(LIGHT)]
        );
    }

    #[test]
    fn test_connected_then_discovered_reaches_ready() {
        let (mut link, _rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        scan(&mut link, light());

        connection(&mut link, ConnectionState::Connected);
        assert_eq!(link.phase(), LinkPhase::DiscoveringServices);
        assert_eq!(link.transport().count(&Call::DiscoverServices), 1);
        assert_eq!(link.ready_characteristic(), None);

        discovered(&mut link, light_services());
        assert_eq!(link.phase(), LinkPhase::Ready);
        assert_eq!(link.ready_characteristic(), Some(LIGHT_CHARACTERISTIC));
    }

    #[test]
    fn test_commit_while_ready_writes_text_payload() {
        let (mut link, mut rx) = ready_link();

        brightness(&mut link, 200, WriteOrigin::Commit);

        assert_eq!(link.transport().writes(), vec![b"200".as_slice()]);
        assert_eq!(
            drain(&mut rx),
            vec![LinkNotice::BrightnessLabel("Current brightness: 200".to_string())]
        );
        assert_eq!(link.phase(), LinkPhase::Ready);
    }

    #[test]
    fn test_repeated_value_produces_equal_writes() {
        let (mut link, _rx) = ready_link();

        brightness(&mut link, 17, WriteOrigin::Live);
        brightness(&mut link, 17, WriteOrigin::Live);

        assert_eq!(link.transport().writes(), vec![b"17".as_slice(), b"17".as_slice()]);
        assert_eq!(link.phase(), LinkPhase::Ready);
    }

    #[test]
    fn test_commit_while_not_ready_rescans_without_writing() {
        let (mut link, mut rx) = controller(RecordingTransport::default());

        brightness(&mut link, 50, WriteOrigin::Commit);

        assert!(link.transport().writes().is_empty());
        assert_eq!(link.transport().count(&Call::StartScan), 1);
        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert!(drain(&mut rx)
            .contains(&LinkNotice::BrightnessLabel(NOT_CONNECTED_TEXT.to_string())));
    }

    #[test]
    fn test_live_change_while_not_ready_only_reports() {
        let (mut link, mut rx) = controller(RecordingTransport::default());

        brightness(&mut link, 50, WriteOrigin::Live);

        assert!(link.transport().calls.is_empty());
        assert_eq!(link.phase(), LinkPhase::Idle);
        assert_eq!(
            drain(&mut rx),
            vec![LinkNotice::BrightnessLabel(NOT_CONNECTED_TEXT.to_string())]
        );
    }

    #[test]
    fn test_commit_during_connect_does_not_rescan() {
        let (mut link, _rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        scan(&mut link, light());

        brightness(&mut link, 80, WriteOrigin::Commit);

        assert_eq!(link.phase(), LinkPhase::Connecting);
        assert_eq!(link.transport().count(&Call::StartScan), 1);
        assert!(link.transport().writes().is_empty());
    }

    #[test]
    fn test_disconnect_while_ready_rescans_and_accepts_again() {
        let (mut link, mut rx) = ready_link();

        connection(&mut link, ConnectionState::Disconnected);

        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert!(!link.has_claimed_peripheral());
        assert_eq!(link.ready_characteristic(), None);
        assert_eq!(
            drain(&mut rx),
            vec![
                LinkNotice::Phase(LinkPhase::Disconnected),
                LinkNotice::Phase(LinkPhase::Scanning)
            ]
        );

        brightness(&mut link, 10, WriteOrigin::Live);
        assert!(link.transport().writes().is_empty());

        scan(&mut link, light());
        assert_eq!(link.phase(), LinkPhase::Connecting);
        assert_eq!(link.transport().count(&Call::Connect(LIGHT)), 2);
    }

    #[test]
    fn test_disconnect_event_releases_transport_link() {
        let (mut link, _rx) = ready_link();

        connection(&mut link, ConnectionState::Disconnected);

        assert_eq!(link.transport().count(&Call::Disconnect), 1);
        assert_eq!(
            link.transport().calls.iter().rev().take(2).collect::<Vec<_>>(),
            vec![&Call::StartScan, &Call::Disconnect]
        );
    }

    #[test]
    fn test_link_lost_with_radio_off_settles_idle() {
        let (mut link, mut rx) = ready_link();
        link.transport_mut().disabled = true;

        connection(&mut link, ConnectionState::Disconnected);

        assert_eq!(link.phase(), LinkPhase::Idle);
        assert!(!link.has_claimed_peripheral());
        assert_eq!(link.transport().count(&Call::StartScan), 1);
        let notices = drain(&mut rx);
        assert_eq!(
            notices.last(),
            Some(&LinkNotice::Status(StatusMessage {
                message: BLUETOOTH_OFF_TEXT.to_string(),
                severity: MessageSeverity::Warning,
            }))
        );
        assert!(notices.contains(&LinkNotice::Phase(LinkPhase::Idle)));

        // Retry once the radio is back
        link.transport_mut().disabled = false;
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        assert_eq!(link.phase(), LinkPhase::Scanning);
    }

    #[test]
    fn test_write_permission_denied_is_fatal() {
        let (mut link, mut rx) = ready_link();
        link.transport_mut().fail_write = Some(TransportError::PermissionDenied);

        brightness(&mut link, 200, WriteOrigin::Commit);

        assert_eq!(link.transport().writes(), vec![b"200".as_slice()]);
        assert!(drain(&mut rx)
            .iter()
            .any(|n| matches!(n, LinkNotice::Fatal(_))));
    }

    #[test]
    fn test_write_platform_error_keeps_link() {
        let (mut link, mut rx) = ready_link();
        link.transport_mut().fail_write = Some(TransportError::Platform("busy".to_string()));

        brightness(&mut link, 42, WriteOrigin::Live);

        assert_eq!(link.phase(), LinkPhase::Ready);
        assert_eq!(link.transport().count(&Call::Disconnect), 0);
        assert!(drain(&mut rx).iter().any(|n| matches!(
            n,
            LinkNotice::Status(StatusMessage { severity: MessageSeverity::Error, .. })
        )));
    }

    #[test]
    fn test_disconnect_during_discovery_short_circuits() {
        let (mut link, _rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        scan(&mut link, light());
        connection(&mut link, ConnectionState::Connected);

        connection(&mut link, ConnectionState::Disconnected);
        assert_eq!(link.phase(), LinkPhase::Scanning);

        // The late discovery result belongs to a dead link
        discovered(&mut link, light_services());
        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert_eq!(link.ready_characteristic(), None);
    }

    #[test]
    fn test_events_for_other_peripherals_are_ignored() {
        let (mut link, _rx) = ready_link();

        let _ = link.handle(LinkInput::Transport(
            TransportEvent::ConnectionStateChanged {
                peripheral: PeripheralId(0xDEAD),
                state: ConnectionState::Disconnected,
            },
        ));
        assert_eq!(link.phase(), LinkPhase::Ready);

        let (mut scanning, _rx) = controller(RecordingTransport::default());
        let _ = scanning.handle(LinkInput::Command(LinkCommand::Start));
        connection(&mut scanning, ConnectionState::Connected);
        connection(&mut scanning, ConnectionState::Disconnected);
        assert_eq!(scanning.phase(), LinkPhase::Scanning);
        assert_eq!(scanning.transport().count(&Call::StartScan), 1);
    }

    #[test]
    fn test_missing_characteristic_drops_link_and_rescans() {
        let (mut link, mut rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        scan(&mut link, light());
        connection(&mut link, ConnectionState::Connected);

        discovered(
            &mut link,
            ServiceTree::new(vec![DiscoveredService {
                id: LIGHT_SERVICE,
                characteristics: vec![],
            }]),
        );

        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert!(!link.has_claimed_peripheral());
        assert_eq!(link.transport().count(&Call::Disconnect), 1);
        assert_eq!(link.transport().count(&Call::StartScan), 2);
        assert!(drain(&mut rx).iter().any(|n| matches!(
            n,
            LinkNotice::Status(StatusMessage { message, .. }) if message == SERVICE_MISSING_TEXT
        )));
    }

    #[test]
    fn test_empty_discovery_takes_missing_service_path() {
        let (mut link, mut rx) = controller(RecordingTransport::default());
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));
        scan(&mut link, light());
        connection(&mut link, ConnectionState::Connected);

        discovered(&mut link, ServiceTree::default());

        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert_eq!(link.transport().count(&Call::Disconnect), 1);
        assert!(drain(&mut rx).iter().any(|n| matches!(
            n,
            LinkNotice::Status(StatusMessage { message, .. }) if message == SERVICE_MISSING_TEXT
        )));
    }

    #[test]
    fn test_connect_failure_returns_to_scanning() {
        let (mut link, _rx) = controller(RecordingTransport {
            fail_connect: Some(TransportError::Platform("busy".to_string())),
            ..Default::default()
        });
        let _ = link.handle(LinkInput::Command(LinkCommand::Start));

        scan(&mut link, light());

        assert_eq!(link.phase(), LinkPhase::Scanning);
        assert_eq!(link.transport().count(&Call::StartScan), 2);

        scan(&mut link, light());
        assert_eq!(link.phase(), LinkPhase::Connecting);
    }

    #[test]
    fn test_no_write_is_issued_outside_ready() {
        let (mut link, _rx) = controller(RecordingTransport::default());
        let inputs = vec![
            LinkInput::Command(LinkCommand::Start),
            LinkInput::Transport(TransportEvent::ScanResult(light())),
            LinkInput::Transport(TransportEvent::ConnectionStateChanged {
                peripheral: LIGHT,
                state: ConnectionState::Connected,
            }),
            LinkInput::Transport(TransportEvent::ServicesDiscovered {
                peripheral: LIGHT,
                services: light_services(),
            }),
            LinkInput::Transport(TransportEvent::ConnectionStateChanged {
                peripheral: LIGHT,
                state: ConnectionState::Disconnected,
            }),
            LinkInput::Transport(TransportEvent::ScanResult(light())),
        ];

        let mut expected_writes = 0;
        for input in inputs {
            let _ = link.handle(input);
            let ready = link.phase() == LinkPhase::Ready;
            for origin in [WriteOrigin::Live, WriteOrigin::Commit] {
                brightness(&mut link, 99, origin);
                if ready {
                    expected_writes += 1;
                }
            }
            assert_eq!(link.transport().writes().len(), expected_writes);
        }
        assert_eq!(expected_writes, 2);
    }

    #[tokio::test]
    async fn test_run_serializes_inbox_and_shuts_down() {
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let link = LinkController::new(RecordingTransport::default(), notice_tx);

        for input in [
            LinkInput::Command(LinkCommand::Start),
            LinkInput::Transport(TransportEvent::ScanResult(light())),
            LinkInput::Transport(TransportEvent::ConnectionStateChanged {
                peripheral: LIGHT,
                state: ConnectionState::Connected,
            }),
            LinkInput::Transport(TransportEvent::ServicesDiscovered {
                peripheral: LIGHT,
                services: light_services(),
            }),
            LinkInput::Command(LinkCommand::SetBrightness {
                value: BrightnessValue::new(128),
                origin: WriteOrigin::Commit,
            }),
            LinkInput::Command(LinkCommand::Shutdown),
        ] {
            inbox_tx.send(input).unwrap();
        }

        link.run(inbox_rx).await;

        let notices = drain(&mut notice_rx);
        let phases: Vec<LinkPhase> = notices
            .iter()
            .filter_map(|n| match n {
                LinkNotice::Phase(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                LinkPhase::Scanning,
                LinkPhase::Connecting,
                LinkPhase::DiscoveringServices,
                LinkPhase::Ready,
                LinkPhase::Idle
            ]
        );
        assert!(notices.contains(&LinkNotice::BrightnessLabel(
            "Current brightness: 128".to_string()
        )));
    }
}
