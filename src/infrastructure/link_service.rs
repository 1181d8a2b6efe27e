//! Light link worker
//!
//! Hosts the [`LinkController`] on its own thread with a current-thread tokio runtime.
//! The UI talks to it through a pair of unbounded channels: commands go in on the same
//! queue the transport posts its events to, notices come back out.

use crate::domain::link::{LinkCommand, LinkController, LinkError, LinkInput};
use crate::domain::models::LinkNotice;
use crate::domain::settings::{Settings, SimulatorSettings, TransportKind};
use crate::domain::transport::{EventSink, Transport};
use crate::infrastructure::bluetooth::SimulatedTransport;
#[cfg(windows)]
use crate::infrastructure::bluetooth::WinRtTransport;
use std::thread;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Transport backend chosen from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Simulated,
    #[cfg(windows)]
    WinRt,
}

impl Backend {
    fn select(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Simulated => Self::Simulated,
            #[cfg(windows)]
            TransportKind::Auto | TransportKind::WinRt => Self::WinRt,
            #[cfg(not(windows))]
            TransportKind::Auto => Self::Simulated,
            #[cfg(not(windows))]
            TransportKind::WinRt => {
                warn!("WinRT Bluetooth is only available on Windows, using the simulated light");
                Self::Simulated
            }
        }
    }

    async fn open(self, events: EventSink, simulator: SimulatorSettings) -> Box<dyn Transport> {
        match self {
            Self::Simulated => Box::new(SimulatedTransport::new(events, simulator)),
            #[cfg(windows)]
            Self::WinRt => Box::new(WinRtTransport::new(events).await),
        }
    }
}

pub struct LinkService {
    inbox: mpsc::UnboundedSender<LinkInput>,
    notices: mpsc::UnboundedReceiver<LinkNotice>,
    worker: Option<thread::JoinHandle<()>>,
}

impl LinkService {
    /// Starts the worker thread and asks it to begin scanning.
    pub fn spawn(settings: &Settings) -> Result<Self, LinkError> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let backend = Backend::select(settings.transport);
        let simulator = settings.simulator.clone();
        let events = EventSink::new(inbox_tx.clone());
        info!("Using {:?} Bluetooth backend", backend);

        let worker = thread::Builder::new()
            .name("light-link".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to create tokio runtime for Bluetooth: {}", e);
                        let _ = notice_tx.send(LinkNotice::Fatal(format!(
                            "Bluetooth worker could not start: {e}"
                        )));
                        return;
                    }
                };

                // WinRT completions are driven by local tasks on this thread.
                let local = tokio::task::LocalSet::new();
                local.block_on(&runtime, async move {
                    let transport = backend.open(events, simulator).await;
                    LinkController::new(transport, notice_tx).run(inbox_rx).await;
                });
            })?;

        let service = Self {
            inbox: inbox_tx,
            notices: notice_rx,
            worker: Some(worker),
        };
        service.send(LinkCommand::Start)?;
        Ok(service)
    }

    pub fn send(&self, command: LinkCommand) -> Result<(), LinkError> {
        self.inbox
            .send(LinkInput::Command(command))
            .map_err(|_| LinkError::WorkerStopped)
    }

    /// Next pending notice, without blocking.
    pub fn try_recv(&mut self) -> Option<LinkNotice> {
        self.notices.try_recv().ok()
    }
}

impl Drop for LinkService {
    fn drop(&mut self) {
        let _ = self.send(LinkCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Light link worker panicked");
            }
        }
    }
}
