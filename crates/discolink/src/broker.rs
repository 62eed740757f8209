//! MQTT broker link over the `rumqttc` sync client.
//!
//! The host has no radio to bring up, so "attaching the network" means
//! resolving the broker address. The broker session is a fresh
//! `Client`/`Connection` pair per attach; `detach` drops both.

use std::net::ToSocketAddrs;
use std::time::{Duration, Instant};

use rumqttc::{
    Client, ConnectReturnCode, Connection, ConnectionError, Event, MqttOptions, Packet, QoS,
    RecvTimeoutError, Transport,
};

use discolink_lib::config::Config;
use discolink_lib::link::{BrokerLink, InboundMessage, LinkError, Result};
use discolink_lib::router::Role;

/// How long to wait for the broker's CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request channel depth for the sync client.
const REQUEST_CAPACITY: usize = 32;

pub struct MqttLink {
    host: String,
    port: u16,
    tls: bool,
    username: String,
    key: String,
    client_id: String,
    wifi_ssid: String,
    keep_alive: Duration,
    poll_timeout: Duration,
    session: Option<(Client, Connection)>,
}

impl MqttLink {
    pub fn new(config: &Config, role: Role) -> Self {
        MqttLink {
            host: config.broker_host.trim().to_string(),
            port: config.broker_port,
            tls: config.broker_tls,
            username: config.username.trim().to_string(),
            key: config.key.clone(),
            client_id: config.client_id(role),
            wifi_ssid: config.wifi_ssid.trim().to_string(),
            keep_alive: config.keep_alive(),
            poll_timeout: config.poll_timeout(),
            session: None,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut opts = MqttOptions::new(&self.client_id, &self.host, self.port);
        opts.set_keep_alive(self.keep_alive);
        opts.set_clean_session(true);
        if !self.username.is_empty() {
            opts.set_credentials(&self.username, &self.key);
        }
        if self.tls {
            opts.set_transport(Transport::tls_with_default_config());
        }
        opts
    }

    fn session(&mut self) -> Result<&mut (Client, Connection)> {
        self.session.as_mut().ok_or(LinkError::NotAttached)
    }
}

fn connection_error(context: &str, e: ConnectionError) -> LinkError {
    match e {
        ConnectionError::Io(e) => LinkError::Io(e),
        ConnectionError::ConnectionRefused(code) => {
            LinkError::BrokerRefused(format!("{context}: {code:?}"))
        }
        other => LinkError::Disconnected(format!("{context}: {other}")),
    }
}

impl BrokerLink for MqttLink {
    fn attach_network(&mut self) -> Result<()> {
        if !self.wifi_ssid.is_empty() {
            log::info!("[link] using host network (configured SSID {})", self.wifi_ssid);
        }
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| LinkError::NetworkUnavailable(format!("dns: {}: {e}", self.host)))?;
        match addrs.next() {
            Some(addr) => {
                log::debug!("[link] {} resolves to {addr}", self.host);
                Ok(())
            }
            None => Err(LinkError::NetworkUnavailable(format!(
                "dns: no address for {}",
                self.host
            ))),
        }
    }

    fn attach_broker(&mut self) -> Result<()> {
        self.detach();
        let (client, mut connection) = Client::new(self.options(), REQUEST_CAPACITY);
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(LinkError::BrokerRefused("connack: timed out".into()));
            }
            match connection.recv_timeout(left) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(LinkError::BrokerRefused(format!("connack: {:?}", ack.code)));
                    }
                    log::info!(
                        "[link] session open on {}:{} as {}",
                        self.host,
                        self.port,
                        self.client_id
                    );
                    self.session = Some((client, connection));
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(connection_error("connect", e)),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(LinkError::BrokerRefused("connack: timed out".into()));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(LinkError::Disconnected("connect: event loop closed".into()));
                }
            }
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        let (client, _) = self.session()?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| LinkError::Disconnected(format!("subscribe: {e}")))
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        let (client, _) = self.session()?;
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        client
            .publish(topic, qos, retain, payload.as_bytes().to_vec())
            .map_err(|e| LinkError::Disconnected(format!("publish: {e}")))
    }

    fn poll(&mut self) -> Result<Option<InboundMessage>> {
        let timeout = self.poll_timeout;
        let (_, connection) = self.session()?;
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(None);
            }
            match connection.recv_timeout(left) {
                Ok(Ok(Event::Incoming(Packet::Publish(p)))) => {
                    let payload = String::from_utf8_lossy(&p.payload).into_owned();
                    return Ok(Some(InboundMessage::new(p.topic, payload)));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    return Err(LinkError::Disconnected("broker sent disconnect".into()));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(connection_error("poll", e)),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(LinkError::Disconnected("poll: event loop closed".into()));
                }
            }
        }
    }

    fn detach(&mut self) {
        if let Some((client, _)) = self.session.as_mut() {
            if let Err(e) = client.disconnect() {
                log::debug!("[link] disconnect: {e}");
            }
            self.session = None;
            log::info!("[link] session closed");
        }
    }
}
