//! Network stations: the thing that actually brings the link up

use super::LinkEvent;
use crate::error::Result;
use crossbeam_channel::Sender;
use std::net::{IpAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Underlying network link driven by the [`LinkMonitor`](super::LinkMonitor)
///
/// Stations report outcomes as [`LinkEvent`]s on the monitor's channel
/// rather than returning them, so a station backed by asynchronous OS
/// notifications fits the same shape.
pub trait Station: Send {
    /// Bring the interface up; must eventually report `StationStarted`
    fn start(&mut self, events: &Sender<LinkEvent>) -> Result<()>;

    /// Issue one connect attempt; reports `AddressAcquired` or `Disconnected`
    fn connect(&mut self, events: &Sender<LinkEvent>);

    /// Periodic health check while connected; reports `Disconnected` on loss
    fn check(&mut self, _events: &Sender<LinkEvent>) {}
}

/// Station for hosts whose OS owns the network interface
///
/// A connect attempt is a TCP connect to the uplink endpoint: if the store
/// is reachable, the link is usable. The local address of the probe socket
/// is reported as the acquired address.
pub struct ProbeStation {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ProbeStation {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    fn probe(&self) -> std::result::Result<IpAddr, String> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| format!("resolve {}: {}", self.host, e))?;

        let mut last_error = format!("{} resolved to no addresses", self.host);
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    return stream
                        .local_addr()
                        .map(|local| local.ip())
                        .map_err(|e| format!("local address: {}", e));
                }
                Err(e) => last_error = format!("connect {}: {}", addr, e),
            }
        }
        Err(last_error)
    }

    fn report(&self, events: &Sender<LinkEvent>, event: LinkEvent) {
        if events.send(event).is_err() {
            log::debug!("Link monitor gone, dropping probe result");
        }
    }
}

impl Station for ProbeStation {
    fn start(&mut self, events: &Sender<LinkEvent>) -> Result<()> {
        log::info!(
            "Probe station started ({}:{}, timeout {:?})",
            self.host,
            self.port,
            self.timeout
        );
        self.report(events, LinkEvent::StationStarted);
        Ok(())
    }

    fn connect(&mut self, events: &Sender<LinkEvent>) {
        log::info!("Connecting to {}:{}...", self.host, self.port);
        let event = match self.probe() {
            Ok(ip) => LinkEvent::AddressAcquired(ip),
            Err(reason) => LinkEvent::Disconnected { reason },
        };
        self.report(events, event);
    }

    fn check(&mut self, events: &Sender<LinkEvent>) {
        if let Err(reason) = self.probe() {
            self.report(events, LinkEvent::Disconnected { reason });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_probe_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut station = ProbeStation::new("127.0.0.1", port, Duration::from_secs(1));
        station.start(&tx).unwrap();
        station.connect(&tx);

        assert_eq!(rx.try_recv().unwrap(), LinkEvent::StationStarted);
        assert!(matches!(rx.try_recv().unwrap(), LinkEvent::AddressAcquired(ip) if ip.is_loopback()));

        // Healthy check reports nothing
        station.check(&tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_probe_refused_reports_disconnect() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut station = ProbeStation::new("127.0.0.1", port, Duration::from_millis(500));
        station.connect(&tx);
        assert!(matches!(rx.try_recv().unwrap(), LinkEvent::Disconnected { .. }));

        station.check(&tx);
        assert!(matches!(rx.try_recv().unwrap(), LinkEvent::Disconnected { .. }));
    }
}
