//! Barcode reader communicator.
//!
//! Wraps one DMCC session to a reader plus the discovery of readers on the
//! network. Incoming reads pass the core [`ReadFilter`]; for a fixed reader
//! a single-shot [`Poller`] implements the suppression window after which a
//! repeated code counts as a new read again.
//!
//! ```text
//!               ┌──────────────── ReaderCommunicator ───────────────┐
//!  discover() ─▶│ Discoverer ──on_found──▶ ReaderListener::on_discovered
//!  connect()  ─▶│ ReaderConnector ──▶ Box<dyn ReaderSession>         │
//!  send_command │        │ reads (mpsc)                              │
//!               │        ▼                                           │
//!               │  handle_reads ─▶ ReadFilter ─▶ ReaderListener::on_read
//!               │        │                                           │
//!               │        └─restart─▶ suppression Poller ─▶ expire()  │
//!               └────────────────────────────────────────────────────┘
//! ```
//!
//! Connect and send are tried twice before the failure is reported to the
//! listener; nothing here returns an error to the caller.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use stationlink_core::reader::{
    is_command_valid, ReadDecision, ReadFilter, ReaderType, DEFAULT_PASSWORD, DEFAULT_USER,
    MAX_ATTEMPTS, NOT_SENT, RESULT_TYPE_COMMAND, SUPPRESSION_WINDOW_MS, UNDEFINED_IP,
};
use stationlink_core::{DeviceError, DeviceFault, SessionState, SessionTracker};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::discovery::Discoverer;
use crate::dmcc::{Credentials, DmccConnector, ReaderConnector, ReaderSession, DMCC_PORT};
use crate::poller::{PollMode, Poller};

/// Receives reads, discoveries and faults from a reader
pub trait ReaderListener: Send + Sync {
    fn on_read(&self, text: &str);

    /// A reader answered discovery; return `true` to stop discovering
    fn on_discovered(&self, ip: Ipv4Addr) -> bool;

    fn on_error(&self, fault: DeviceFault);
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Logical name used in logs and faults
    pub name: String,
    pub reader_type: ReaderType,
    pub port: u16,
    pub credentials: Credentials,
    pub suppression_window: Duration,
    /// Attempts for connect and for each command
    pub max_attempts: u32,
}

impl ReaderConfig {
    pub fn new(name: impl Into<String>, reader_type: ReaderType) -> Self {
        ReaderConfig {
            name: name.into(),
            reader_type,
            port: DMCC_PORT,
            credentials: Credentials {
                user: DEFAULT_USER.to_string(),
                password: DEFAULT_PASSWORD.to_string(),
            },
            suppression_window: Duration::from_millis(SUPPRESSION_WINDOW_MS),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// State shared with the read handling task
struct Shared {
    name: String,
    listener: Arc<dyn ReaderListener>,
    filter: Arc<Mutex<ReadFilter>>,
    scanner_on: AtomicBool,
    suppression: Mutex<Poller>,
}

impl Shared {
    fn report(&self, operation: &'static str, error: DeviceError) {
        log::error!("{}: reader {} failed: {}", self.name, operation, error);
        self.listener
            .on_error(DeviceFault::new(&self.name, operation, error));
    }

    fn restart_suppression(&self) {
        let filter = self.filter.clone();
        self.suppression
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .restart(move || {
                filter.lock().unwrap_or_else(PoisonError::into_inner).expire();
                std::future::ready(())
            });
    }

    fn handle_read(&self, raw: &str) {
        let decision = self
            .filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .process(raw, self.scanner_on.load(Ordering::Acquire));

        match decision {
            ReadDecision::Forward {
                text,
                restart_window,
            } => {
                log::debug!("{}: read '{}'", self.name, text);
                if restart_window {
                    self.restart_suppression();
                }
                self.listener.on_read(&text);
            }
            ReadDecision::Duplicate => {
                log::debug!("{}: duplicate read '{}' suppressed", self.name, raw);
            }
            ReadDecision::PoweredOff => {
                log::debug!("{}: read '{}' dropped, scanner is off", self.name, raw);
            }
        }
    }
}

async fn handle_reads(shared: Arc<Shared>, mut reads: mpsc::UnboundedReceiver<String>) {
    while let Some(raw) = reads.recv().await {
        shared.handle_read(&raw);
    }
}

pub struct ReaderCommunicator {
    shared: Arc<Shared>,
    connector: Arc<dyn ReaderConnector>,
    reader_type: ReaderType,
    port: u16,
    credentials: Credentials,
    max_attempts: u32,
    state: SessionTracker,
    session: Option<Box<dyn ReaderSession>>,
    reads_task: Option<JoinHandle<()>>,
    /// Address of the most recent connect
    last_ip: Option<IpAddr>,
    discoverer: Discoverer,
}

impl ReaderCommunicator {
    pub fn new(config: ReaderConfig, listener: Arc<dyn ReaderListener>) -> Self {
        let suppression = Poller::new(
            format!("{} suppression", config.name),
            config.suppression_window,
            PollMode::Once,
        );
        ReaderCommunicator {
            shared: Arc::new(Shared {
                name: config.name.clone(),
                listener,
                filter: Arc::new(Mutex::new(ReadFilter::new(config.reader_type))),
                scanner_on: AtomicBool::new(false),
                suppression: Mutex::new(suppression),
            }),
            connector: Arc::new(DmccConnector::default()),
            reader_type: config.reader_type,
            port: config.port,
            credentials: config.credentials,
            max_attempts: config.max_attempts.max(1),
            state: SessionTracker::new(),
            session: None,
            reads_task: None,
            last_ip: None,
            discoverer: Discoverer::new(config.name),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn ReaderConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_discoverer(mut self, discoverer: Discoverer) -> Self {
        self.discoverer = discoverer;
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn reader_type(&self) -> ReaderType {
        self.reader_type
    }

    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state.can_send() && self.session.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.state() == SessionState::Disconnected
    }

    pub fn is_disconnecting(&self) -> bool {
        self.state.state() == SessionState::Disconnecting
    }

    pub fn scanner_on(&self) -> bool {
        self.shared.scanner_on.load(Ordering::Acquire)
    }

    pub fn ip_address(&self) -> String {
        match self.last_ip {
            Some(ip) => ip.to_string(),
            None => UNDEFINED_IP.to_string(),
        }
    }

    pub fn is_command_valid(&self, command: &str) -> bool {
        is_command_valid(command)
    }

    // -------------------------------------------------------------------------
    // Discovery
    // -------------------------------------------------------------------------

    /// Start discovering readers. Each reader found is offered to the
    /// listener, which ends discovery by returning `true`.
    pub fn discover(&mut self) -> bool {
        let listener = self.shared.listener.clone();
        match self
            .discoverer
            .start(move |reader| listener.on_discovered(reader.address))
        {
            Ok(()) => true,
            Err(e) => {
                self.shared.report("discover", e.into());
                false
            }
        }
    }

    pub fn stop_discovering(&mut self) {
        self.discoverer.stop();
    }

    pub fn is_discovering(&self) -> bool {
        self.discoverer.is_running()
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Connect, log in, select read-string results and switch the scanner
    /// off. Returns whether a session is up.
    pub async fn connect(&mut self, ip: IpAddr) -> bool {
        let addr = SocketAddr::new(ip, self.port);
        self.last_ip = Some(ip);

        for attempt in 1..=self.max_attempts {
            match self.try_connect(addr).await {
                Ok(()) => {
                    log::info!("{}: reader connected at {}", self.shared.name, addr);
                    self.turn_off().await;
                    return true;
                }
                Err(e) if attempt < self.max_attempts => {
                    log::warn!(
                        "{}: connect to reader at {} failed: {}, retrying",
                        self.shared.name,
                        addr,
                        e
                    );
                }
                Err(e) => self.shared.report("connect", e),
            }
        }
        false
    }

    async fn try_connect(&mut self, addr: SocketAddr) -> Result<(), DeviceError> {
        self.close_session().await;
        self.state.start_connecting();
        log::info!("{}: connecting to reader at {}", self.shared.name, addr);

        let (reads_tx, reads) = mpsc::unbounded_channel();
        let mut session = match self
            .connector
            .connect(addr, &self.credentials, reads_tx)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.state.failed();
                return Err(e);
            }
        };
        self.state.start_authenticating();
        let reads_task = tokio::spawn(handle_reads(self.shared.clone(), reads));

        if let Err(e) = session.send(RESULT_TYPE_COMMAND).await {
            reads_task.abort();
            if let Err(close) = session.close().await {
                log::debug!("{}: closing rejected session: {}", self.shared.name, close);
            }
            self.state.failed();
            return Err(e);
        }

        self.session = Some(session);
        self.reads_task = Some(reads_task);
        self.state.connected();
        Ok(())
    }

    /// Send a command and return the reader's reply, or [`NOT_SENT`] when
    /// there is no session or the command failed twice.
    pub async fn send_command(&mut self, command: &str) -> String {
        if !self.state.can_send() {
            return NOT_SENT.to_string();
        }
        let Some(session) = self.session.as_mut() else {
            return NOT_SENT.to_string();
        };

        for attempt in 1..=self.max_attempts {
            match session.send(command).await {
                Ok(reply) => return reply,
                Err(e) if attempt < self.max_attempts => {
                    log::warn!("{}: '{}' failed: {}, retrying", self.shared.name, command, e);
                }
                Err(e) => self.shared.report("send_command", e),
            }
        }
        NOT_SENT.to_string()
    }

    pub async fn turn_on(&mut self) {
        self.shared.scanner_on.store(true, Ordering::Release);
        self.send_preset(true).await;
    }

    pub async fn turn_off(&mut self) {
        self.shared.scanner_on.store(false, Ordering::Release);
        self.send_preset(false).await;
    }

    /// Ignore reads from now on without talking to the reader
    pub fn quick_turn_off(&mut self) {
        self.shared.scanner_on.store(false, Ordering::Release);
    }

    async fn send_preset(&mut self, on: bool) {
        log::debug!(
            "{}: switching {} scanner {}",
            self.shared.name,
            self.reader_type,
            if on { "on" } else { "off" }
        );
        for command in self.reader_type.power_preset(on) {
            self.send_command(command).await;
        }
    }

    /// Send a saved reader configuration, one command per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Returns the
    /// number of commands the reader accepted.
    pub async fn upload_configuration(&mut self, path: &Path) -> std::io::Result<usize> {
        let contents = tokio::fs::read_to_string(path).await?;
        if !self.is_connected() {
            log::warn!(
                "{}: not uploading {}, reader is not connected",
                self.shared.name,
                path.display()
            );
            return Ok(0);
        }

        let mut accepted = 0;
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.send_command(line).await != NOT_SENT {
                accepted += 1;
            }
        }
        log::info!(
            "{}: uploaded {} commands from {}",
            self.shared.name,
            accepted,
            path.display()
        );
        Ok(accepted)
    }

    pub async fn disconnect(&mut self) {
        if self.session.is_some() {
            self.state.start_disconnecting();
            log::info!("{}: disconnecting reader", self.shared.name);
        }
        self.close_session().await;
    }

    async fn close_session(&mut self) {
        if let Some(task) = self.reads_task.take() {
            task.abort();
        }
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                self.shared.report("disconnect", e);
            }
        }
        self.state.disconnected();
    }
}

/// Closes a still-open session by dropping it, which releases the socket.
/// Faults cannot be reported from here; call
/// [`ReaderCommunicator::disconnect`] first to have them reach the listener.
impl Drop for ReaderCommunicator {
    fn drop(&mut self) {
        if let Some(task) = self.reads_task.take() {
            task.abort();
        }
        if let Some(session) = self.session.take() {
            log::debug!(
                "{}: dropping reader session to {}",
                self.shared.name,
                session.peer()
            );
        }
    }
}
