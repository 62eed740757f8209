//! Connection lifecycle: keeps a node attached to network and broker.
//!
//! [`ConnectionManager`] owns the [`BrokerLink`] and the
//! [`ConnectionState`] ladder. Transient failures leave the state where it
//! was and come back as [`ConnectError::Retryable`]; only repeated hard I/O
//! faults (or a network failure at boot) escalate to [`ConnectError::Fatal`].

use std::fmt;
use std::time::Duration;

use crate::clock::Clock;
use crate::link::{BrokerLink, InboundMessage, LinkError};
use crate::reconnect::{ReconnectConfig, ReconnectState};

/// Upper bound on messages drained by a single [`ConnectionManager::pump`].
pub const MAX_MESSAGES_PER_PUMP: usize = 8;

/// Attachment level. Ordered: `BrokerAttached` implies `NetworkAttached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Disconnected,
    NetworkAttached,
    BrokerAttached,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::NetworkAttached => write!(f, "network attached"),
            ConnectionState::BrokerAttached => write!(f, "broker attached"),
        }
    }
}

/// Successful outcome of [`ConnectionManager::ensure_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// Already attached; no I/O was performed.
    AlreadyAttached,
    /// A new broker session was opened. Subscriptions must be renewed.
    Attached,
}

#[derive(Debug)]
pub enum ConnectError {
    /// The attempt failed; try again on a later tick.
    Retryable(LinkError),
    /// Backoff is in effect; no attempt was made.
    BackingOff(Duration),
    /// The node cannot recover without a full restart.
    Fatal(LinkError),
}

impl ConnectError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectError::Fatal(_))
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Retryable(e) => write!(f, "{e} (will retry)"),
            ConnectError::BackingOff(d) => {
                write!(f, "reconnect backing off ({:.1}s left)", d.as_secs_f64())
            }
            ConnectError::Fatal(e) => write!(f, "{e} (unrecoverable)"),
        }
    }
}

impl std::error::Error for ConnectError {}

pub struct ConnectionManager<L: BrokerLink, C: Clock> {
    link: L,
    clock: C,
    state: ConnectionState,
    reconnect: ReconnectState,
    hard_faults: u32,
    max_hard_faults: u32,
}

impl<L: BrokerLink, C: Clock> ConnectionManager<L, C> {
    pub fn new(link: L, clock: C, reconnect: ReconnectConfig, max_hard_faults: u32) -> Self {
        Self {
            link,
            clock,
            state: ConnectionState::Disconnected,
            reconnect: ReconnectState::new(reconnect),
            hard_faults: 0,
            max_hard_faults: max_hard_faults.max(1),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.state == ConnectionState::BrokerAttached
    }

    /// Consecutive failed attach attempts since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.reconnect.consecutive_failures()
    }

    /// First attach at power-on. A network failure here is fatal: there is
    /// nothing useful the node can do without ever having joined.
    pub fn connect_at_boot(&mut self) -> Result<Attach, ConnectError> {
        if self.state == ConnectionState::Disconnected {
            log::info!("[link] joining network");
            if let Err(e) = self.link.attach_network() {
                log::error!("[link] network attach failed at boot: {e}");
                return Err(ConnectError::Fatal(e));
            }
            self.state = ConnectionState::NetworkAttached;
        }
        self.ensure_connected()
    }

    /// Idempotent attach. Does nothing when already broker-attached.
    ///
    /// Failures never move the state backwards, but a rung reached on the
    /// way is kept: if the network attaches and the broker then refuses,
    /// the state stays `NetworkAttached` and the next attempt goes straight
    /// to the broker.
    pub fn ensure_connected(&mut self) -> Result<Attach, ConnectError> {
        if self.is_attached() {
            return Ok(Attach::AlreadyAttached);
        }
        let now = self.clock.now();
        if !self.reconnect.should_attempt(now) {
            return Err(ConnectError::BackingOff(self.reconnect.remaining(now)));
        }

        match self.attach() {
            Ok(()) => {
                if self.reconnect.consecutive_failures() > 0 {
                    log::info!(
                        "[link] reconnected after {} failed attempt(s)",
                        self.reconnect.consecutive_failures()
                    );
                } else {
                    log::info!("[link] connected to broker");
                }
                self.reconnect.record_success();
                self.hard_faults = 0;
                Ok(Attach::Attached)
            }
            Err(e) => {
                self.reconnect.record_failure(self.clock.now());
                if e.is_hard_fault() {
                    self.hard_faults += 1;
                    if self.hard_faults >= self.max_hard_faults {
                        log::error!(
                            "[link] {} consecutive hard faults, giving up: {e}",
                            self.hard_faults
                        );
                        return Err(ConnectError::Fatal(e));
                    }
                } else {
                    self.hard_faults = 0;
                }
                log::warn!(
                    "[link] connect failed: {e} (attempt {}, next retry in {:.1}s)",
                    self.reconnect.consecutive_failures(),
                    self.reconnect.current_delay().as_secs_f64()
                );
                Err(ConnectError::Retryable(e))
            }
        }
    }

    /// Walk the ladder from the current state. On failure the state stays
    /// at whatever rung was reached before the failing step.
    fn attach(&mut self) -> Result<(), LinkError> {
        if self.state == ConnectionState::Disconnected {
            self.link.attach_network()?;
            self.state = ConnectionState::NetworkAttached;
        }
        self.link.attach_broker()?;
        self.state = ConnectionState::BrokerAttached;
        Ok(())
    }

    /// Service broker I/O once and collect whatever arrived.
    ///
    /// A transport failure demotes the state to `Disconnected`. Messages
    /// taken off the link before the failure are still returned, since the
    /// broker will not deliver them again; the error is only surfaced when
    /// nothing arrived.
    pub fn pump(&mut self) -> Result<Vec<InboundMessage>, LinkError> {
        if !self.is_attached() {
            return Err(LinkError::NotAttached);
        }
        let mut inbound = Vec::new();
        while inbound.len() < MAX_MESSAGES_PER_PUMP {
            match self.link.poll() {
                Ok(Some(msg)) => inbound.push(msg),
                Ok(None) => break,
                Err(e) => {
                    self.demote(&e);
                    if inbound.is_empty() {
                        return Err(e);
                    }
                    break;
                }
            }
        }
        Ok(inbound)
    }

    /// Publish on the attached session. Callers must have called
    /// [`ensure_connected`](Self::ensure_connected) first.
    pub fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), LinkError> {
        if !self.is_attached() {
            return Err(LinkError::NotAttached);
        }
        self.link.publish(topic, payload, retain).inspect_err(|e| {
            self.demote(e);
        })
    }

    pub fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        if !self.is_attached() {
            return Err(LinkError::NotAttached);
        }
        self.link.subscribe(topic).inspect_err(|e| {
            self.demote(e);
        })
    }

    /// Close the session on shutdown.
    pub fn disconnect(&mut self) {
        self.link.detach();
        self.state = ConnectionState::Disconnected;
    }

    fn demote(&mut self, e: &LinkError) {
        log::warn!("[link] transport failure, dropping session: {e}");
        self.link.detach();
        self.state = ConnectionState::Disconnected;
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}
