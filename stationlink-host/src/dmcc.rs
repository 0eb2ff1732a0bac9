//! DMCC session to a barcode reader.
//!
//! DMCC is a line oriented text protocol on TCP port 23. After a telnet
//! style login (`User:` / `Password:` prompts) the client sends commands
//! framed as `||>COMMAND\r\n`. Each command is answered by one line
//! `||[status]payload`; status 0 means success. Any other line the reader
//! sends is an unsolicited read result.
//!
//! ```text
//!  send("GET DEVICE.TYPE") ──▶ waiter queued ──▶ "||>GET DEVICE.TYPE\r\n"
//!                                                  │
//!  waiter (oneshot) ◀── line task ◀── "||[0]DM262\r\n"
//!  reads     (mpsc) ◀──    │     ◀── "0123456789\r\n"
//! ```
//!
//! Replies are paired with commands in order. A reply whose command already
//! timed out is dropped instead of being handed to the next command.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use stationlink_core::DeviceError;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// DMCC (telnet) port of the reader
pub const DMCC_PORT: u16 = 23;

/// Default time a command may take to be answered
pub const COMMAND_TIMEOUT_MS: u64 = 10_000;

const USER_PROMPT: &str = "User:";
const PASSWORD_PROMPT: &str = "Password:";
const LOGIN_OK: &str = "Login succeeded";
const LOGIN_INVALID: &str = "Invalid";

/// Login used for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// An open, logged-in reader session
#[async_trait]
pub trait ReaderSession: Send {
    /// Send one command and wait for its reply payload
    async fn send(&mut self, command: &str) -> Result<String, DeviceError>;

    async fn close(&mut self) -> Result<(), DeviceError>;

    fn peer(&self) -> SocketAddr;
}

/// Opens reader sessions; unsolicited reads go to `reads`
#[async_trait]
pub trait ReaderConnector: Send + Sync {
    async fn connect(
        &self,
        addr: SocketAddr,
        credentials: &Credentials,
        reads: mpsc::UnboundedSender<String>,
    ) -> Result<Box<dyn ReaderSession>, DeviceError>;
}

// =============================================================================
// Line format
// =============================================================================

/// One line received from the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmccLine {
    /// Reply to the outstanding command
    Response { status: i32, payload: String },
    /// Unsolicited read result
    Read(String),
    Empty,
}

pub fn format_command(command: &str) -> String {
    format!("||>{}\r\n", command)
}

/// Classify one line (without its line terminator)
pub fn parse_line(line: &str) -> Result<DmccLine, DeviceError> {
    if line.is_empty() {
        return Ok(DmccLine::Empty);
    }
    let Some(rest) = line.strip_prefix("||") else {
        return Ok(DmccLine::Read(line.to_string()));
    };

    let invalid = || DeviceError::InvalidResponse(line.to_string());
    let rest = rest.strip_prefix('[').ok_or_else(invalid)?;
    let (status, payload) = rest.split_once(']').ok_or_else(invalid)?;
    let status = status.trim().parse::<i32>().map_err(|_| invalid())?;

    Ok(DmccLine::Response {
        status,
        payload: payload.to_string(),
    })
}

fn into_reply(status: i32, payload: String) -> Result<String, DeviceError> {
    if status == 0 {
        Ok(payload)
    } else {
        Err(DeviceError::Protocol {
            status,
            message: payload,
        })
    }
}

// =============================================================================
// TCP session
// =============================================================================

/// Connects DMCC sessions over TCP
#[derive(Debug, Clone)]
pub struct DmccConnector {
    pub timeout: Duration,
}

impl Default for DmccConnector {
    fn default() -> Self {
        DmccConnector {
            timeout: Duration::from_millis(COMMAND_TIMEOUT_MS),
        }
    }
}

#[async_trait]
impl ReaderConnector for DmccConnector {
    async fn connect(
        &self,
        addr: SocketAddr,
        credentials: &Credentials,
        reads: mpsc::UnboundedSender<String>,
    ) -> Result<Box<dyn ReaderSession>, DeviceError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| timeout_error(self.timeout))??;
        let (mut reader, mut writer) = stream.into_split();

        let mut buf = Vec::new();
        login(&mut reader, &mut writer, &mut buf, credentials, self.timeout).await?;
        log::debug!("{}: DMCC login as '{}' succeeded", addr, credentials.user);

        let (waiters, waiters_rx) = mpsc::unbounded_channel();
        let lines = tokio::spawn(read_lines(addr, reader, buf, waiters_rx, reads));

        Ok(Box::new(DmccSession {
            writer,
            waiters,
            lines,
            peer: addr,
            timeout: self.timeout,
        }))
    }
}

fn timeout_error(timeout: Duration) -> DeviceError {
    DeviceError::Timeout(timeout.as_millis() as u64)
}

/// Read until one of `needles` shows up; returns its index.
///
/// Everything up to and including the needle is consumed from `buf`.
async fn expect_any(
    reader: &mut OwnedReadHalf,
    buf: &mut Vec<u8>,
    needles: &[&str],
    timeout: Duration,
) -> Result<usize, DeviceError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut chunk = [0u8; 512];
    loop {
        let text = String::from_utf8_lossy(buf).into_owned();
        let found = needles
            .iter()
            .enumerate()
            .filter_map(|(i, n)| text.find(n).map(|pos| (pos, i, n.len())))
            .min();
        if let Some((pos, index, len)) = found {
            // Lossy decoding may change lengths; fall back to clearing it all
            let end = (pos + len).min(buf.len());
            buf.drain(..end);
            return Ok(index);
        }

        let n = tokio::time::timeout_at(deadline, reader.read(&mut chunk))
            .await
            .map_err(|_| timeout_error(timeout))??;
        if n == 0 {
            return Err(DeviceError::Transport("connection closed during login".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn login(
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
    buf: &mut Vec<u8>,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<(), DeviceError> {
    expect_any(reader, buf, &[USER_PROMPT], timeout).await?;
    writer
        .write_all(format!("{}\r\n", credentials.user).as_bytes())
        .await?;

    expect_any(reader, buf, &[PASSWORD_PROMPT], timeout).await?;
    writer
        .write_all(format!("{}\r\n", credentials.password).as_bytes())
        .await?;

    match expect_any(reader, buf, &[LOGIN_OK, LOGIN_INVALID], timeout).await? {
        0 => {
            // Rest of the confirmation line
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                buf.drain(..=pos);
            }
            Ok(())
        }
        _ => Err(DeviceError::LoginFailed),
    }
}

type Reply = Result<String, DeviceError>;

/// Hand a reply to the oldest outstanding command
fn deliver(
    peer: SocketAddr,
    waiters: &mut mpsc::UnboundedReceiver<oneshot::Sender<Reply>>,
    reply: Reply,
) {
    match waiters.try_recv() {
        Ok(waiter) => {
            if waiter.send(reply).is_err() {
                log::debug!("{}: dropping reply to a command that timed out", peer);
            }
        }
        Err(_) => log::debug!("{}: dropping reply with no command outstanding", peer),
    }
}

/// Split the stream into lines and route them. `leftover` holds whatever
/// arrived after the login confirmation.
async fn read_lines(
    peer: SocketAddr,
    reader: OwnedReadHalf,
    leftover: Vec<u8>,
    mut waiters: mpsc::UnboundedReceiver<oneshot::Sender<Reply>>,
    reads: mpsc::UnboundedSender<String>,
) {
    let mut lines = BufReader::new(Cursor::new(leftover).chain(reader)).split(b'\n');
    loop {
        let raw = match lines.next_segment().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("{}: DMCC connection closed by reader", peer);
                break;
            }
            Err(e) => {
                log::debug!("{}: DMCC read error: {}", peer, e);
                break;
            }
        };
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches('\r');

        match parse_line(line) {
            Ok(DmccLine::Response { status, payload }) => {
                log::trace!("{}: reply [{}] {}", peer, status, payload);
                deliver(peer, &mut waiters, into_reply(status, payload));
            }
            Ok(DmccLine::Read(text)) => {
                log::trace!("{}: read '{}'", peer, text);
                let _ = reads.send(text);
            }
            Ok(DmccLine::Empty) => {}
            Err(e) => deliver(peer, &mut waiters, Err(e)),
        }
    }
}

pub struct DmccSession {
    writer: OwnedWriteHalf,
    /// Outstanding commands, oldest first
    waiters: mpsc::UnboundedSender<oneshot::Sender<Reply>>,
    lines: JoinHandle<()>,
    peer: SocketAddr,
    timeout: Duration,
}

#[async_trait]
impl ReaderSession for DmccSession {
    async fn send(&mut self, command: &str) -> Result<String, DeviceError> {
        let closed = || DeviceError::Transport("connection closed".into());

        // Queued before writing so a fast reply always finds its waiter
        let (waiter, reply) = oneshot::channel();
        self.waiters.send(waiter).map_err(|_| closed())?;

        log::trace!("{}: sending {}", self.peer, command);
        self.writer
            .write_all(format_command(command).as_bytes())
            .await?;

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(closed()),
            Err(_) => Err(timeout_error(self.timeout)),
        }
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.lines.abort();
        self.writer.shutdown().await?;
        Ok(())
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for DmccSession {
    fn drop(&mut self) {
        self.lines.abort();
    }
}
