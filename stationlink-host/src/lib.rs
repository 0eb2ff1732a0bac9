//! # Stationlink Host
//!
//! Tokio host for a workstation's signage display and barcode reader.
//!
//! The protocol logic (register layouts, text encoding, window plans, read
//! filtering, discovery parsing) lives in [`stationlink_core`]; this crate
//! owns the sockets, the timers and the tasks.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      stationlink-host                         │
//! │  ┌───────────────────────┐     ┌────────────────────────────┐ │
//! │  │  DisplayController    │     │  ReaderCommunicator        │ │
//! │  │  - pages, messages    │     │  - DMCC commands, presets  │ │
//! │  │  - windows, labels    │     │  - read filter, window     │ │
//! │  │  - button pollers     │     │  - UDP discovery           │ │
//! │  └──────────┬────────────┘     └─────────────┬──────────────┘ │
//! │             │ ModbusIo                       │ ReaderSession  │
//! │             ▼                                ▼                │
//! │  ┌───────────────────────┐     ┌────────────────────────────┐ │
//! │  │ tokio-modbus TCP 8000 │     │ DMCC over TCP 23           │ │
//! │  └───────────────────────┘     └────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport faults are reported through the [`display::DisplayListener`]
//! and [`reader::ReaderListener`] callbacks and never abort the caller.
//!
//! ## Command-Line Interface
//!
//! See [`Cli`]. The binary loads [`settings::Settings`] and runs one
//! display or reader session:
//!
//! ```text
//! stationlink display 10.0.0.20 --page pass --message "Scan the next part"
//! stationlink display --window two --label 1:RETRY:Retry --watch 60
//! stationlink reader discover --timeout 10
//! stationlink reader connect 10.0.0.30 --type fixed --on --listen 300
//! ```

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stationlink_core::{Button, Page, ReaderType, Window};

pub mod discovery;
pub mod display;
pub mod dmcc;
pub mod modbus;
pub mod poller;
pub mod reader;
pub mod settings;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(name = "stationlink", version)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Settings file, instead of the one in the config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Drive the signage display
    Display(DisplayArgs),

    /// Talk to the barcode reader
    #[command(subcommand)]
    Reader(ReaderCommand),
}

#[derive(Args, Clone, Debug)]
pub struct DisplayArgs {
    /// Display address; defaults to the one in the settings
    pub ip: Option<IpAddr>,

    /// Background page: pass, fail, message, pass-ok, fail-ng or blue
    #[arg(long)]
    pub page: Option<Page>,

    /// Button window: none, one, two or three
    #[arg(long)]
    pub window: Option<Window>,

    /// Message text; `\n` starts a new line
    #[arg(short, long)]
    pub message: Option<String>,

    /// Bind a button as `N:COMMAND:LABEL`, may be repeated
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<LabelArg>,

    /// Keep polling the buttons for this many seconds
    #[arg(long, default_value_t = 0)]
    pub watch: u64,
}

/// A button binding given on the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelArg {
    pub button: Button,
    pub command: String,
    pub label: String,
}

fn parse_label(s: &str) -> Result<LabelArg, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(number), Some(command), Some(label)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected N:COMMAND:LABEL, got '{}'", s));
    };
    let number: u8 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid button number '{}'", number))?;
    Ok(LabelArg {
        button: Button::try_from(number)?,
        command: command.to_string(),
        label: label.to_string(),
    })
}

fn parse_reader_type(s: &str) -> Result<ReaderType, String> {
    ReaderType::try_from(s)
}

#[derive(Subcommand, Clone, Debug)]
pub enum ReaderCommand {
    /// Broadcast discovery probes and list the readers that answer
    Discover {
        /// Seconds to keep probing
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Stop at the first reader found
        #[arg(long, default_value_t = false)]
        first: bool,
    },

    /// Connect to a reader and send commands
    Connect(ReaderArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ReaderArgs {
    /// Reader address; defaults to the one in the settings
    pub ip: Option<IpAddr>,

    /// Reader type: handheld or fixed
    #[arg(long = "type", value_parser = parse_reader_type)]
    pub reader_type: Option<ReaderType>,

    /// Switch the scanner on after connecting
    #[arg(long, default_value_t = false)]
    pub on: bool,

    /// Send a command after connecting, may be repeated
    #[arg(long = "send")]
    pub commands: Vec<String>,

    /// Upload a reader configuration file
    #[arg(long)]
    pub upload: Option<PathBuf>,

    /// Print reads for this many seconds before disconnecting
    #[arg(long, default_value_t = 0)]
    pub listen: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let cli = Cli::parse_from([
            "stationlink",
            "display",
            "10.0.0.20",
            "--page",
            "pass-ok",
            "--window",
            "two",
            "--label",
            "1:RETRY:Retry",
            "--label",
            "2:SKIP:Skip: part",
            "-m",
            "Scan the next part",
        ]);
        let Command::Display(args) = cli.command else {
            panic!("expected display command");
        };
        assert_eq!(args.ip, Some("10.0.0.20".parse().unwrap()));
        assert_eq!(args.page, Some(Page::PassOk));
        assert_eq!(args.window, Some(Window::TwoButtons));
        assert_eq!(args.message.as_deref(), Some("Scan the next part"));
        assert_eq!(args.watch, 0);
        assert_eq!(
            args.labels,
            vec![
                LabelArg {
                    button: Button::One,
                    command: "RETRY".into(),
                    label: "Retry".into(),
                },
                LabelArg {
                    button: Button::Two,
                    command: "SKIP".into(),
                    label: "Skip: part".into(),
                },
            ]
        );
    }

    #[test]
    fn test_reader_commands() {
        let cli = Cli::parse_from([
            "stationlink",
            "-vv",
            "--config",
            "/tmp/ws07.json",
            "reader",
            "connect",
            "--type",
            "fixed",
            "--on",
            "--send",
            "GET DEVICE.TYPE",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ws07.json")));
        let Command::Reader(ReaderCommand::Connect(args)) = cli.command else {
            panic!("expected reader connect");
        };
        assert_eq!(args.ip, None);
        assert_eq!(args.reader_type, Some(ReaderType::Fixed));
        assert!(args.on);
        assert_eq!(args.commands, vec!["GET DEVICE.TYPE"]);

        let cli = Cli::parse_from(["stationlink", "reader", "discover", "--first"]);
        assert!(matches!(
            cli.command,
            Command::Reader(ReaderCommand::Discover {
                timeout: 10,
                first: true
            })
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Cli::try_parse_from(["stationlink", "display", "--label", "4:X:Y"]).is_err());
        assert!(Cli::try_parse_from(["stationlink", "display", "--label", "1:X"]).is_err());
        assert!(Cli::try_parse_from(["stationlink", "display", "--page", "green"]).is_err());
        assert!(
            Cli::try_parse_from(["stationlink", "reader", "connect", "--type", "overhead"]).is_err()
        );
    }
}
