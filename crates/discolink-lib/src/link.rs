//! Network and broker transport: trait + test double.
//!
//! The radio driver, TLS, and socket plumbing live behind [`BrokerLink`];
//! the connection lifecycle above it only sees attach/publish/poll calls
//! and a classified error.

use std::fmt;

// ── Error type ──

/// Transport errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the step (e.g. `"dns"`, `"connack"`) and *details*
/// describes what went wrong.
#[derive(Debug)]
pub enum LinkError {
    /// The network could not be joined (radio, DNS, route).
    NetworkUnavailable(String),
    /// The broker rejected or never answered the session request.
    BrokerRefused(String),
    /// An established session dropped.
    Disconnected(String),
    /// An operation was attempted without an attached session.
    NotAttached,
    /// Low-level socket or driver fault.
    Io(std::io::Error),
}

impl LinkError {
    /// Hard faults count toward the fatal threshold; everything else is
    /// a plain retryable failure.
    pub fn is_hard_fault(&self) -> bool {
        matches!(self, LinkError::Io(_))
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::NetworkUnavailable(e) => write!(f, "Network unavailable: {e}"),
            LinkError::BrokerRefused(e) => write!(f, "Broker refused connection: {e}"),
            LinkError::Disconnected(e) => write!(f, "Disconnected: {e}"),
            LinkError::NotAttached => write!(f, "Not connected to broker"),
            LinkError::Io(e) => write!(f, "Link I/O fault: {e}"),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        LinkError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// One message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

// ── Trait ──

pub trait BrokerLink {
    /// Join the network. May block up to the driver's own timeout.
    fn attach_network(&mut self) -> Result<()>;
    /// Open a broker session over an attached network.
    fn attach_broker(&mut self) -> Result<()>;
    fn subscribe(&mut self, topic: &str) -> Result<()>;
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<()>;
    /// Service broker I/O once. Returns at most one inbound message and must
    /// not block longer than the link's configured poll timeout.
    fn poll(&mut self) -> Result<Option<InboundMessage>>;
    /// Drop the broker session, if any. Never fails.
    fn detach(&mut self) {}
}

/// Scriptable [`BrokerLink`] for unit and integration tests.
///
/// Each operation pops a queued failure if one is scripted, otherwise
/// succeeds and is recorded. Inbound messages are delivered one per `poll`;
/// a scripted poll failure fires once the inbound queue has run dry.
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Published {
        pub topic: String,
        pub payload: String,
        pub retain: bool,
    }

    /// Shared state behind a [`MockLink`]. Tests keep a clone of the `Rc`
    /// to script failures and inspect traffic after handing the link away.
    #[derive(Debug, Default)]
    pub struct MockLinkState {
        pub network_attaches: Cell<u32>,
        pub broker_attaches: Cell<u32>,
        pub detaches: Cell<u32>,
        pub subscriptions: RefCell<Vec<String>>,
        pub published: RefCell<Vec<Published>>,
        pub inbound: RefCell<VecDeque<InboundMessage>>,
        pub network_failures: RefCell<VecDeque<LinkError>>,
        pub broker_failures: RefCell<VecDeque<LinkError>>,
        pub publish_failures: RefCell<VecDeque<LinkError>>,
        pub poll_failures: RefCell<VecDeque<LinkError>>,
    }

    impl MockLinkState {
        pub fn push_inbound(&self, topic: &str, payload: &str) {
            self.inbound
                .borrow_mut()
                .push_back(InboundMessage::new(topic, payload));
        }

        pub fn fail_next_network(&self, e: LinkError) {
            self.network_failures.borrow_mut().push_back(e);
        }

        pub fn fail_next_broker(&self, e: LinkError) {
            self.broker_failures.borrow_mut().push_back(e);
        }

        pub fn fail_next_publish(&self, e: LinkError) {
            self.publish_failures.borrow_mut().push_back(e);
        }

        pub fn fail_next_poll(&self, e: LinkError) {
            self.poll_failures.borrow_mut().push_back(e);
        }

        /// Total attach calls of either kind.
        pub fn attach_calls(&self) -> u32 {
            self.network_attaches.get() + self.broker_attaches.get()
        }

        /// Payloads published to `topic`, in order.
        pub fn payloads_for(&self, topic: &str) -> Vec<String> {
            self.published
                .borrow()
                .iter()
                .filter(|p| p.topic == topic)
                .map(|p| p.payload.clone())
                .collect()
        }
    }

    #[derive(Debug, Default)]
    pub struct MockLink {
        pub state: Rc<MockLinkState>,
    }

    impl MockLink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Handle for scripting and inspection after the link is moved.
        pub fn handle(&self) -> Rc<MockLinkState> {
            Rc::clone(&self.state)
        }
    }

    fn pop(queue: &RefCell<VecDeque<LinkError>>) -> Result<()> {
        match queue.borrow_mut().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    impl BrokerLink for MockLink {
        fn attach_network(&mut self) -> Result<()> {
            let s = &self.state;
            s.network_attaches.set(s.network_attaches.get() + 1);
            pop(&s.network_failures)
        }

        fn attach_broker(&mut self) -> Result<()> {
            let s = &self.state;
            s.broker_attaches.set(s.broker_attaches.get() + 1);
            pop(&s.broker_failures)
        }

        fn subscribe(&mut self, topic: &str) -> Result<()> {
            self.state.subscriptions.borrow_mut().push(topic.to_string());
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<()> {
            pop(&self.state.publish_failures)?;
            self.state.published.borrow_mut().push(Published {
                topic: topic.to_string(),
                payload: payload.to_string(),
                retain,
            });
            Ok(())
        }

        fn poll(&mut self) -> Result<Option<InboundMessage>> {
            if let Some(msg) = self.state.inbound.borrow_mut().pop_front() {
                return Ok(Some(msg));
            }
            pop(&self.state.poll_failures)?;
            Ok(None)
        }

        fn detach(&mut self) {
            self.state.detaches.set(self.state.detaches.get() + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLink;
    use super::*;

    #[test]
    fn only_io_is_hard_fault() {
        let io = LinkError::Io(std::io::Error::other("spi bus"));
        assert!(io.is_hard_fault());
        assert!(!LinkError::NotAttached.is_hard_fault());
        assert!(!LinkError::Disconnected("eof".into()).is_hard_fault());
        assert!(!LinkError::NetworkUnavailable("no ap".into()).is_hard_fault());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            LinkError::BrokerRefused("connack: bad credentials".into()).to_string(),
            "Broker refused connection: connack: bad credentials"
        );
        assert_eq!(LinkError::NotAttached.to_string(), "Not connected to broker");
    }

    #[test]
    fn mock_delivers_inbound_in_order() {
        let mut link = MockLink::new();
        let h = link.handle();
        h.push_inbound("a", "1");
        h.push_inbound("b", "2");
        assert_eq!(link.poll().unwrap().unwrap().topic, "a");
        assert_eq!(link.poll().unwrap().unwrap().topic, "b");
        assert!(link.poll().unwrap().is_none());
    }

    #[test]
    fn mock_scripted_publish_failure_is_not_recorded() {
        let mut link = MockLink::new();
        let h = link.handle();
        h.fail_next_publish(LinkError::Disconnected("reset".into()));
        assert!(link.publish("t", "x", false).is_err());
        assert!(link.publish("t", "y", true).is_ok());
        assert_eq!(h.payloads_for("t"), vec!["y".to_string()]);
        assert!(h.published.borrow()[0].retain);
    }
}
