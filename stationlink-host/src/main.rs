use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use stationlink_core::DeviceFault;
use stationlink_host::display::{DisplayController, DisplayListener};
use stationlink_host::reader::{ReaderCommunicator, ReaderListener};
use stationlink_host::settings::Settings;
use stationlink_host::{Cli, Command, DisplayArgs, ReaderArgs, ReaderCommand, VERSION};

/// Prints device events on stdout
#[derive(Default)]
struct Console {
    stop_at_first_reader: bool,
}

impl DisplayListener for Console {
    fn on_button(&self, command: &str, label: &str) {
        println!("button '{}' pressed: {}", label, command);
    }

    fn on_error(&self, fault: DeviceFault) {
        eprintln!("{}", fault);
    }
}

impl ReaderListener for Console {
    fn on_read(&self, text: &str) {
        println!("read: {}", text);
    }

    fn on_discovered(&self, ip: Ipv4Addr) -> bool {
        println!("reader at {}", ip);
        self.stop_at_first_reader
    }

    fn on_error(&self, fault: DeviceFault) {
        eprintln!("{}", fault);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.verbose.log_level_filter())
        .init();
    log::info!("stationlink {}", VERSION);

    let settings = Settings::load(args.config.as_deref()).into_diagnostic()?;

    match args.command {
        Command::Display(display) => run_display(&settings, display).await,
        Command::Reader(ReaderCommand::Discover { timeout, first }) => {
            discover(&settings, Duration::from_secs(timeout), first).await
        }
        Command::Reader(ReaderCommand::Connect(reader)) => run_reader(&settings, reader).await,
    }
}

/// Wait `secs` seconds, or until Ctrl-C
async fn hold(secs: u64) {
    if secs == 0 {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted"),
    }
}

async fn run_display(settings: &Settings, args: DisplayArgs) -> Result<()> {
    let ip: IpAddr = args
        .ip
        .or(settings.display.address)
        .ok_or_else(|| miette!("No display address given or configured"))?;
    let translator = settings.translator().into_diagnostic()?;

    let mut display = DisplayController::new(settings.display_config(), Arc::new(Console::default()))
        .with_translator(Arc::new(translator));
    if !display.connect(ip).await {
        return Err(miette!("{}: cannot connect to display at {}", display.name(), ip));
    }

    if let Some(page) = args.page {
        display.set_page(page).await;
    }
    for binding in &args.labels {
        display
            .set_button_label(binding.button, &binding.command, &binding.label)
            .await;
    }
    if let Some(window) = args.window {
        display.set_display_window(window).await;
    }
    if let Some(message) = &args.message {
        display
            .set_message(&message.replace("\\n", "\n"))
            .await
            .into_diagnostic()?;
    }

    hold(args.watch).await;
    display.disconnect().await;
    Ok(())
}

async fn discover(settings: &Settings, timeout: Duration, first: bool) -> Result<()> {
    let listener = Arc::new(Console {
        stop_at_first_reader: first,
    });
    let mut reader = ReaderCommunicator::new(settings.reader_config(), listener);
    if !reader.discover() {
        return Err(miette!("Cannot start reader discovery"));
    }

    tokio::select! {
        _ = tokio::time::sleep(timeout) => {}
        _ = async {
            while reader.is_discovering() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        } => {}
    }
    reader.stop_discovering();
    Ok(())
}

async fn run_reader(settings: &Settings, args: ReaderArgs) -> Result<()> {
    let ip: IpAddr = args
        .ip
        .or(settings.reader.address)
        .ok_or_else(|| miette!("No reader address given or configured"))?;

    let mut config = settings.reader_config();
    if let Some(reader_type) = args.reader_type {
        config.reader_type = reader_type;
    }
    let mut reader = ReaderCommunicator::new(config, Arc::new(Console::default()))
        .with_connector(Arc::new(settings.dmcc_connector()));
    if !reader.connect(ip).await {
        return Err(miette!("{}: cannot connect to reader at {}", reader.name(), ip));
    }

    if let Some(path) = &args.upload {
        let accepted = reader.upload_configuration(path).await.into_diagnostic()?;
        println!("{} commands accepted from {}", accepted, path.display());
    }
    for command in &args.commands {
        if !reader.is_command_valid(command) {
            log::warn!("'{}' is not an operator command, sending anyway", command);
        }
        let reply = reader.send_command(command).await;
        println!("{} -> {}", command, reply);
    }

    if args.on {
        reader.turn_on().await;
    }
    hold(args.listen).await;
    if reader.scanner_on() {
        reader.turn_off().await;
    }
    reader.disconnect().await;
    Ok(())
}
