//! Signage display controller.
//!
//! Owns one Modbus-TCP session to the display and everything drawn on it:
//! the background page, three message lines, three button labels and the
//! button window. Each of the three buttons is watched by its own
//! [`Poller`]; a press is reported to the [`DisplayListener`] together with
//! the command bound to the button.
//!
//! ```text
//!   caller ──set_page/set_message/...──▶ DisplayController
//!                                          │  (tokio Mutex)
//!   Poller 1 ─┐                            ▼
//!   Poller 2 ─┼──── poll_button ────▶ Box<dyn ModbusIo> ──▶ display
//!   Poller 3 ─┘         │
//!                       ▼
//!               DisplayListener::on_button / on_error
//! ```
//!
//! Transport faults never surface as `Err`: they go to the listener and the
//! controller carries on. Only content problems (`set_message` text that
//! does not fit) and using the display before connecting are returned.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use stationlink_core::display::{
    plan_window, AddressTable, Button, CoilWrite, DisplayButton, DisplayMessage, DisplayMode,
    DisplayPage, Page, RegisterWrite, Window, WindowPlan, CONNECT_TIMEOUT_MS, DISPLAY_PORT,
    MESSAGE_LINES, UNDEFINED_IP,
};
use stationlink_core::display::button::DEFAULT_POLL_INTERVAL_MS;
use stationlink_core::layout::split_message;
use stationlink_core::translate::{Identity, Translation, Translator};
use stationlink_core::{DeviceError, DeviceFault, LayoutError, SessionState, SessionTracker};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::modbus::{ModbusConnector, ModbusIo, TcpModbusConnector};
use crate::poller::{PollMode, Poller};

/// Receives button presses and transport faults from a display
pub trait DisplayListener: Send + Sync {
    fn on_button(&self, command: &str, label: &str);
    fn on_error(&self, fault: DeviceFault);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("Display is not connected")]
    NotReady,

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Static configuration of a display controller
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Logical name used in logs and faults, normally the workstation name
    pub name: String,
    pub mode: DisplayMode,
    pub port: u16,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
}

impl DisplayConfig {
    pub fn new(name: impl Into<String>) -> Self {
        DisplayConfig {
            name: name.into(),
            mode: DisplayMode::default(),
            port: DISPLAY_PORT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
        }
    }
}

/// State shared with the button poll tasks
struct Shared {
    name: String,
    session: Mutex<Option<Box<dyn ModbusIo>>>,
    buttons: RwLock<[DisplayButton; 3]>,
    listener: Arc<dyn DisplayListener>,
}

impl Shared {
    fn report(&self, operation: &'static str, error: DeviceError) {
        log::error!("{}: display {} failed: {}", self.name, operation, error);
        self.listener
            .on_error(DeviceFault::new(&self.name, operation, error));
    }
}

pub struct DisplayController {
    shared: Arc<Shared>,
    connector: Arc<dyn ModbusConnector>,
    translator: Arc<dyn Translator>,
    table: AddressTable,
    translate: bool,
    port: u16,
    connect_timeout: Duration,
    state: SessionTracker,
    peer: Option<SocketAddr>,
    page: DisplayPage,
    messages: [DisplayMessage; 3],
    labels: [DisplayMessage; 3],
    pollers: [Poller; 3],
    window: Window,
}

impl DisplayController {
    pub fn new(config: DisplayConfig, listener: Arc<dyn DisplayListener>) -> Self {
        let table = AddressTable::resolve(config.mode);
        let slot = |address: u16, len: usize| DisplayMessage::new(address, len, table.encoding);
        let interval_ms = config.poll_interval.as_millis() as u64;
        let button = |b: Button| DisplayButton::new(b, table.buttons[b.index()], interval_ms);
        let poller = |b: Button| {
            Poller::new(
                format!("{} {}", config.name, b),
                config.poll_interval,
                PollMode::Repeat,
            )
        };

        DisplayController {
            shared: Arc::new(Shared {
                name: config.name.clone(),
                session: Mutex::new(None),
                buttons: RwLock::new(Button::ALL.map(button)),
                listener,
            }),
            connector: Arc::new(TcpModbusConnector),
            translator: Arc::new(Identity),
            page: DisplayPage::new(table.background),
            messages: table.messages.map(|a| slot(a, table.message_len)),
            labels: table.labels.map(|a| slot(a, table.label_len)),
            pollers: Button::ALL.map(poller),
            translate: config.mode.translate,
            port: config.port,
            connect_timeout: config.connect_timeout,
            state: SessionTracker::new(),
            peer: None,
            window: Window::ThreeButtons,
            table,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn ModbusConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Translator consulted in translation mode
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state.can_send()
    }

    pub fn current_window(&self) -> Window {
        self.window
    }

    pub fn current_page(&self) -> Option<Page> {
        self.page.current()
    }

    pub fn ip_address(&self) -> String {
        match self.peer {
            Some(addr) => addr.ip().to_string(),
            None => UNDEFINED_IP.to_string(),
        }
    }

    pub fn is_polling(&self, button: Button) -> bool {
        self.pollers[button.index()].is_enabled()
    }

    /// Open the session and bring the display to a known state.
    ///
    /// Returns whether the display is connected. A display that does not
    /// answer within the connect timeout is only logged; a refused connect is
    /// also reported to the listener.
    pub async fn connect(&mut self, ip: IpAddr) -> bool {
        let addr = SocketAddr::new(ip, self.port);
        let name = self.shared.name.clone();

        if let Some(mut old) = self.shared.session.lock().await.take() {
            log::debug!("{}: replacing display session to {}", name, old.peer());
            if let Err(e) = old.shutdown().await {
                log::debug!("{}: closing previous session: {}", name, e);
            }
        }
        self.state.disconnected();
        self.state.start_connecting();
        log::info!("{}: connecting to display at {}", name, addr);

        let io = match tokio::time::timeout(self.connect_timeout, self.connector.connect(addr)).await
        {
            Ok(Ok(io)) => io,
            Ok(Err(e)) => {
                self.state.failed();
                self.disable_inputs();
                self.shared.report("connect", e);
                return false;
            }
            Err(_) => {
                log::warn!(
                    "{}: display at {} did not answer within {:?}",
                    name,
                    addr,
                    self.connect_timeout
                );
                self.state.failed();
                self.disable_inputs();
                return false;
            }
        };

        *self.shared.session.lock().await = Some(io);
        self.peer = Some(addr);
        self.state.connected();
        log::info!("{}: display connected at {}", name, addr);

        for coil in self.table.buttons {
            self.write_coil("connect", CoilWrite::off(coil)).await;
        }
        for i in 0..MESSAGE_LINES {
            let write = self.messages[i].reset();
            self.write_registers("connect", write).await;
        }
        for coil in AddressTable::all_window_coils() {
            self.write_coil("connect", CoilWrite::off(coil)).await;
        }

        self.window = Window::ThreeButtons;
        self.enable_inputs();
        true
    }

    /// Close the session. No coils are touched; the pollers are always
    /// stopped, even when closing the socket fails.
    pub async fn disconnect(&mut self) {
        let session = self.shared.session.lock().await.take();
        if let Some(mut io) = session {
            self.state.start_disconnecting();
            log::info!("{}: disconnecting display at {}", self.shared.name, io.peer());
            if let Err(e) = io.shutdown().await {
                self.shared.report("disconnect", e);
            }
        }
        self.state.disconnected();
        self.peer = None;
        self.disable_inputs();
    }

    pub async fn set_page(&mut self, page: Page) {
        if !self.is_connected() {
            return;
        }
        log::debug!("{}: page {}", self.shared.name, page);
        let write = self.page.set(page);
        self.write_registers("set_page", write).await;
    }

    /// Switch the button window: one window coil asserted, the others
    /// released, and exactly the visible buttons polled.
    pub async fn set_display_window(&mut self, window: Window) {
        if !self.is_connected() {
            return;
        }
        let plan = plan_window(window, &self.table.windows);
        self.apply_window(plan).await;
    }

    async fn apply_window(&mut self, plan: WindowPlan) {
        log::debug!("{}: window {}", self.shared.name, plan.window);
        for write in &plan.coils {
            self.write_coil("set_display_window", *write).await;
        }
        for button in Button::ALL {
            if plan.polling[button.index()] {
                self.enable_poller(button);
            } else {
                self.pollers[button.index()].disable();
            }
        }
        self.window = plan.window;
    }

    /// Show `text` on the message lines.
    ///
    /// A two-character text is a short status code and goes centred on the
    /// middle line. In translation mode the translated text goes on the first
    /// line. Otherwise the text is split over the three lines.
    pub async fn set_message(&mut self, text: &str) -> Result<(), DisplayError> {
        if !self.is_connected() {
            return Err(DisplayError::NotReady);
        }

        if text.chars().count() == 2 {
            let shown = self.shown_text(text);
            self.clear_slot(0).await;
            self.clear_slot(2).await;
            self.set_slot(1, &shown).await;
        } else if self.translate {
            let shown = self.translated(text);
            self.set_slot(0, &shown).await;
            self.clear_slot(1).await;
        } else {
            let lines = split_message(text, MESSAGE_LINES, self.table.message_len)?;
            for i in 0..MESSAGE_LINES {
                match lines.get(i) {
                    Some(line) => self.set_slot(i, line).await,
                    None => self.clear_slot(i).await,
                }
            }
        }
        Ok(())
    }

    /// Blank all message lines that hold text
    pub async fn clear_message(&mut self) {
        if !self.is_connected() {
            return;
        }
        for i in 0..MESSAGE_LINES {
            self.clear_slot(i).await;
        }
    }

    /// Bind `command` to `button` and show `label` on it.
    ///
    /// An empty command leaves the button visible but silent.
    pub async fn set_button_label(&mut self, button: Button, command: &str, label: &str) {
        self.shared
            .buttons
            .write()
            .unwrap_or_else(PoisonError::into_inner)[button.index()]
        .bind(command, label);

        if !self.is_connected() {
            return;
        }
        let shown = self.shown_text(label);
        let write = self.labels[button.index()].set(&shown);
        self.write_registers("set_button_label", write).await;
    }

    /// Stop polling all buttons, leaving the display untouched
    pub fn disable_inputs(&mut self) {
        for poller in &mut self.pollers {
            poller.disable();
        }
    }

    pub fn enable_inputs(&mut self) {
        for button in Button::ALL {
            self.enable_poller(button);
        }
    }

    fn enable_poller(&mut self, button: Button) {
        let shared = self.shared.clone();
        self.pollers[button.index()].enable(move || poll_button(shared.clone(), button));
    }

    fn shown_text(&self, text: &str) -> String {
        if self.translate {
            self.translated(text)
        } else {
            text.to_string()
        }
    }

    fn translated(&self, text: &str) -> String {
        let translation = self.translator.translate(text);
        if translation == Translation::Miss && !text.is_empty() {
            log::debug!("{}: no translation for '{}'", self.shared.name, text);
        }
        translation.into_text()
    }

    async fn set_slot(&mut self, index: usize, text: &str) {
        let write = self.messages[index].set(text);
        self.write_registers("set_message", write).await;
    }

    async fn clear_slot(&mut self, index: usize) {
        if let Some(write) = self.messages[index].clear() {
            self.write_registers("set_message", write).await;
        }
    }

    async fn write_registers(&self, operation: &'static str, write: RegisterWrite) {
        let mut session = self.shared.session.lock().await;
        let Some(io) = session.as_mut() else {
            return;
        };
        if let Err(e) = io.write_registers(write.address, &write.words).await {
            self.shared.report(operation, e);
        }
    }

    async fn write_coil(&self, operation: &'static str, write: CoilWrite) {
        let mut session = self.shared.session.lock().await;
        let Some(io) = session.as_mut() else {
            return;
        };
        if let Err(e) = io.write_coil(write.address, write.value).await {
            self.shared.report(operation, e);
        }
    }
}

/// One poll cycle: read the button coil, report a press, release the coil
async fn poll_button(shared: Arc<Shared>, button: Button) {
    let (coil, press) = {
        let buttons = shared.buttons.read().unwrap_or_else(PoisonError::into_inner);
        let b = &buttons[button.index()];
        (b.coil(), b.press())
    };

    let mut session = shared.session.lock().await;
    let Some(io) = session.as_mut() else {
        return;
    };

    match io.read_coil(coil).await {
        Ok(true) => {
            match press {
                Some((command, label)) => {
                    log::info!("{}: {} pressed: {}", shared.name, button, command);
                    shared.listener.on_button(&command, &label);
                }
                None => log::debug!("{}: {} pressed while unbound", shared.name, button),
            }
            if let Err(e) = io.write_coil(coil, false).await {
                shared.report("poll_button", e);
            }
        }
        Ok(false) => {}
        Err(e) => shared.report("poll_button", e),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Mutex as StdMutex;

    use stationlink_core::codec::{decode_narrow, decode_wide, NARROW_PAD_WORD};
    use stationlink_core::translate::RuleTranslator;

    use super::*;
    use crate::modbus::mock::{MockConnector, Op, SharedBus};

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20));

    #[derive(Default)]
    struct Recorder {
        presses: StdMutex<Vec<(String, String)>>,
        faults: StdMutex<Vec<DeviceFault>>,
    }

    impl DisplayListener for Recorder {
        fn on_button(&self, command: &str, label: &str) {
            self.presses
                .lock()
                .unwrap()
                .push((command.to_string(), label.to_string()));
        }

        fn on_error(&self, fault: DeviceFault) {
            self.faults.lock().unwrap().push(fault);
        }
    }

    fn controller(mode: DisplayMode) -> (DisplayController, SharedBus, Arc<Recorder>) {
        let (connector, bus) = MockConnector::new();
        let recorder = Arc::new(Recorder::default());
        let mut config = DisplayConfig::new("WS-07");
        config.mode = mode;
        let display =
            DisplayController::new(config, recorder.clone()).with_connector(Arc::new(connector));
        (display, bus, recorder)
    }

    async fn connected(mode: DisplayMode) -> (DisplayController, SharedBus, Arc<Recorder>) {
        let (mut display, bus, recorder) = controller(mode);
        assert!(display.connect(IP).await);
        bus.lock().unwrap().ops.clear();
        (display, bus, recorder)
    }

    fn register_text(bus: &SharedBus, address: u16) -> String {
        decode_narrow(&bus.lock().unwrap().registers[&address])
            .trim_end()
            .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_initialises_display() {
        let (mut display, bus, recorder) = controller(DisplayMode::default());
        assert_eq!(display.ip_address(), "IP is undefined");
        assert!(display.connect(IP).await);
        assert!(display.is_connected());
        assert_eq!(display.ip_address(), "10.0.0.20");
        assert_eq!(display.current_window(), Window::ThreeButtons);
        for b in Button::ALL {
            assert!(display.is_polling(b));
        }

        let bus = bus.lock().unwrap();
        for coil in [10, 11, 12, 1, 2, 3, 4, 5, 6, 7] {
            assert!(bus.ops.contains(&Op::WriteCoil(coil, false)), "coil {}", coil);
        }
        for address in [10018, 10100, 10150] {
            assert_eq!(bus.registers[&address], vec![NARROW_PAD_WORD; 16]);
        }
        assert!(recorder.faults.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connect_reports_and_returns_false() {
        let (connector, _bus) = MockConnector::new();
        let connector = MockConnector {
            refuse: Some(DeviceError::Transport("connection refused".into())),
            ..connector
        };
        let recorder = Arc::new(Recorder::default());
        let mut display = DisplayController::new(DisplayConfig::new("WS-07"), recorder.clone())
            .with_connector(Arc::new(connector));

        assert!(!display.connect(IP).await);
        assert!(!display.is_connected());
        assert!(!display.is_polling(Button::One));
        let faults = recorder.faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].operation, "connect");
        assert_eq!(faults[0].device, "WS-07");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_is_logged_only() {
        let (connector, _bus) = MockConnector::new();
        let connector = MockConnector {
            hang: true,
            ..connector
        };
        let recorder = Arc::new(Recorder::default());
        let mut display = DisplayController::new(DisplayConfig::new("WS-07"), recorder.clone())
            .with_connector(Arc::new(connector));

        let started = tokio::time::Instant::now();
        assert!(!display.connect(IP).await);
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert!(recorder.faults.lock().unwrap().is_empty());
        assert_eq!(display.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_message_splits_lines() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.set_message("Hello\nWorld").await.unwrap();

        assert_eq!(register_text(&bus, 10018), "Hello");
        assert_eq!(register_text(&bus, 10100), "World");
        assert_eq!(register_text(&bus, 10150), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_message_clears_unused_lines() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.set_message("one\ntwo\nthree").await.unwrap();
        display.set_message("only").await.unwrap();

        assert_eq!(register_text(&bus, 10018), "only");
        assert_eq!(register_text(&bus, 10100), "");
        assert_eq!(register_text(&bus, 10150), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_message_requires_connection() {
        let (mut display, bus, _) = controller(DisplayMode::default());
        assert_eq!(display.set_message("Hello").await, Err(DisplayError::NotReady));
        assert!(bus.lock().unwrap().ops.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_message_layout_error_writes_nothing() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        let result = display.set_message("1\n2\n3\n4").await;
        assert!(matches!(
            result,
            Err(DisplayError::Layout(LayoutError::Overflow { required: 4, .. }))
        ));
        assert!(bus.lock().unwrap().ops.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_character_code_goes_on_middle_line() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.set_message("first\nsecond\nthird").await.unwrap();
        display.set_message("OK").await.unwrap();

        assert_eq!(register_text(&bus, 10018), "");
        assert_eq!(register_text(&bus, 10100), "OK");
        assert_eq!(register_text(&bus, 10150), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_translation_mode_writes_first_line() {
        let mode = DisplayMode {
            unicode: true,
            translate: true,
        };
        let (connector, bus) = MockConnector::new();
        let mut dictionary = RuleTranslator::new();
        dictionary.insert("Pass", "合格");
        let mut config = DisplayConfig::new("WS-07");
        config.mode = mode;
        let mut display = DisplayController::new(config, Arc::new(Recorder::default()))
            .with_connector(Arc::new(connector))
            .with_translator(Arc::new(dictionary));
        assert!(display.connect(IP).await);

        display.set_message("Pass").await.unwrap();
        let words = bus.lock().unwrap().registers[&10200].clone();
        assert_eq!(words.len(), 14);
        assert_eq!(decode_wide(&words).trim_end(), "合格");

        display.set_message("Unknown text").await.unwrap();
        let words = bus.lock().unwrap().registers[&10200].clone();
        assert_eq!(decode_wide(&words).trim_end(), "UTT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_message_is_noop_when_blank() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.clear_message().await;
        assert!(bus.lock().unwrap().ops.is_empty());

        display.set_message("Hello").await.unwrap();
        bus.lock().unwrap().ops.clear();
        display.clear_message().await;
        assert_eq!(
            bus.lock().unwrap().ops,
            vec![Op::WriteRegisters(10018, vec![NARROW_PAD_WORD; 16])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_page() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.set_page(Page::Fail).await;
        assert_eq!(
            bus.lock().unwrap().ops,
            vec![Op::WriteRegisters(10010, vec![0x3F80])]
        );
        assert_eq!(display.current_page(), Some(Page::Fail));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_are_silent_when_disconnected() {
        let (mut display, bus, recorder) = controller(DisplayMode::default());
        display.set_page(Page::Pass).await;
        display.set_display_window(Window::OneButton).await;
        display.clear_message().await;
        assert!(bus.lock().unwrap().ops.is_empty());
        assert!(recorder.faults.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_button_window() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.set_display_window(Window::TwoButtons).await;

        assert!(display.is_polling(Button::One));
        assert!(display.is_polling(Button::Two));
        assert!(!display.is_polling(Button::Three));
        assert_eq!(display.current_window(), Window::TwoButtons);

        let bus = bus.lock().unwrap();
        let asserted: Vec<u16> = [1, 2, 3]
            .into_iter()
            .filter(|c| bus.coils.get(c) == Some(&true))
            .collect();
        assert_eq!(asserted, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_press_is_reported_and_released() {
        let (mut display, bus, recorder) = connected(DisplayMode::default()).await;
        display.set_button_label(Button::One, "NEXT", "Next").await;
        assert_eq!(register_text(&bus, 10050), "Next");

        bus.lock().unwrap().coils.insert(10, true);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(
            *recorder.presses.lock().unwrap(),
            vec![("NEXT".to_string(), "Next".to_string())]
        );
        assert_eq!(bus.lock().unwrap().coils[&10], false);

        // Released coil is not reported again
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(recorder.presses.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbound_press_is_released_silently() {
        let (_display, bus, recorder) = connected(DisplayMode::default()).await;
        bus.lock().unwrap().coils.insert(11, true);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(recorder.presses.lock().unwrap().is_empty());
        assert_eq!(bus.lock().unwrap().coils[&11], false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_button_is_not_polled() {
        let (mut display, bus, recorder) = connected(DisplayMode::default()).await;
        display.set_button_label(Button::Three, "REWORK", "Rework").await;
        display.set_display_window(Window::TwoButtons).await;

        bus.lock().unwrap().coils.insert(12, true);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(recorder.presses.lock().unwrap().is_empty());
        assert!(!bus.lock().unwrap().ops.contains(&Op::ReadCoil(12)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_pollers_even_on_failure() {
        let (mut display, bus, recorder) = connected(DisplayMode::default()).await;
        bus.lock().unwrap().fail = Some(DeviceError::Transport("reset".into()));

        display.disconnect().await;
        assert!(!display.is_connected());
        for b in Button::ALL {
            assert!(!display.is_polling(b));
        }
        assert!(bus.lock().unwrap().ops.contains(&Op::Shutdown));
        assert_eq!(recorder.faults.lock().unwrap()[0].operation, "disconnect");
        assert_eq!(display.ip_address(), "IP is undefined");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fault_is_reported() {
        let (_display, bus, recorder) = connected(DisplayMode::default()).await;
        bus.lock().unwrap().fail = Some(DeviceError::Exception("IllegalDataAddress".into()));
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let faults = recorder.faults.lock().unwrap();
        assert_eq!(faults.len(), 3);
        assert!(faults.iter().all(|f| f.operation == "poll_button"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pollers() {
        let (display, bus, _) = connected(DisplayMode::default()).await;
        drop(display);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(bus.lock().unwrap().ops.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_inputs_keeps_coils() {
        let (mut display, bus, _) = connected(DisplayMode::default()).await;
        display.disable_inputs();
        assert!(!display.is_polling(Button::Two));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(bus.lock().unwrap().ops.is_empty());

        display.enable_inputs();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(bus.lock().unwrap().ops.contains(&Op::ReadCoil(10)));
    }
}
