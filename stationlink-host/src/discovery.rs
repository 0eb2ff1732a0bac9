//! UDP broadcast discovery of barcode readers.
//!
//! Runs the core [`ReaderLocator`] on its own tokio task: a probe goes out
//! every [`PROBE_INTERVAL_MS`], every datagram coming back is parsed, and
//! each newly seen reader is handed to the callback. The callback returns
//! `true` to end discovery.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use stationlink_core::discovery::{
    DiscoveredReader, ReaderLocator, DISCOVERY_PORT, PROBE, PROBE_INTERVAL_MS,
};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Broadcast socket bound to an ephemeral port
pub fn create_discovery_socket() -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;

    let bind = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&socket2::SockAddr::from(bind))?;
    log::trace!("Discovery socket bound to {:?}", socket.local_addr()?.as_socket());

    UdpSocket::from_std(socket.into())
}

pub struct Discoverer {
    name: String,
    target: SocketAddr,
    probe_interval: Duration,
    token: Option<CancellationToken>,
    running: Arc<AtomicBool>,
}

impl Discoverer {
    pub fn new(name: impl Into<String>) -> Self {
        Discoverer {
            name: name.into(),
            target: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            probe_interval: Duration::from_millis(PROBE_INTERVAL_MS),
            token: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send probes somewhere other than the limited broadcast address
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a discovery run, replacing any run in progress.
    pub fn start<F>(&mut self, mut on_found: F) -> io::Result<()>
    where
        F: FnMut(DiscoveredReader) -> bool + Send + 'static,
    {
        self.stop();
        let socket = create_discovery_socket()?;

        let token = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        self.token = Some(token.clone());
        self.running = running.clone();

        let name = self.name.clone();
        let target = self.target;
        let probe_interval = self.probe_interval;

        log::info!("{}: discovering readers via {}", name, target);
        tokio::spawn(async move {
            let mut locator = ReaderLocator::new();
            let mut ticker = interval(probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut buf = [0u8; 1500];

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = socket.send_to(PROBE, target).await {
                            log::warn!("{}: discovery probe to {} failed: {}", name, target, e);
                        }
                    }
                    r = socket.recv_from(&mut buf) => {
                        let (len, from) = match r {
                            Ok(r) => r,
                            Err(e) => {
                                log::warn!("{}: discovery receive failed: {}", name, e);
                                continue;
                            }
                        };
                        let SocketAddr::V4(from) = from else {
                            continue;
                        };
                        match locator.process(&buf[..len], from) {
                            Ok(Some(reader)) => {
                                log::info!("{}: found reader at {}", name, reader.address);
                                if on_found(reader) {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => log::debug!("{}: ignoring datagram from {}: {}", name, from, e),
                        }
                    }
                }
            }
            running.store(false, Ordering::Release);
            log::debug!("{}: discovery stopped", name);
        });
        Ok(())
    }

    /// Stop the current run; does nothing when none is running
    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for Discoverer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    /// A reader that answers every probe with a description
    async fn fake_reader(reply: &'static [u8]) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            while let Ok((len, from)) = socket.recv_from(&mut buf).await {
                assert_eq!(&buf[..len], PROBE);
                socket.send_to(reply, from).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_discovers_reader_once() {
        let target = fake_reader(b"name=DM-LINE3;type=DM262").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut discoverer = Discoverer::new("test").with_target(target);
        discoverer.probe_interval = Duration::from_millis(50);

        discoverer
            .start(move |reader| {
                let _ = tx.send(reader);
                false
            })
            .unwrap();
        assert!(discoverer.is_running());

        let reader = rx.recv().await.unwrap();
        assert_eq!(reader.address, Ipv4Addr::LOCALHOST);
        assert_eq!(reader.name.as_deref(), Some("DM-LINE3"));

        // Later probes are answered too, but the reader is reported once
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        discoverer.stop();
        discoverer.stop();
        assert!(!discoverer.is_running());
    }

    #[tokio::test]
    async fn test_callback_can_end_discovery() {
        let target = fake_reader(b"").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut discoverer = Discoverer::new("test").with_target(target);

        discoverer
            .start(move |reader| {
                let _ = tx.send(reader.address);
                true
            })
            .unwrap();

        assert_eq!(rx.recv().await, Some(Ipv4Addr::LOCALHOST));
        // Task ended and dropped the callback with its sender
        assert_eq!(rx.recv().await, None);
        assert!(!discoverer.is_running());
    }
}
