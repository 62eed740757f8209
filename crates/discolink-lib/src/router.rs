//! Topic routing: feed names, payload decoding, and publish-with-retry.
//!
//! [`MessageRouter`] sits on top of the [`ConnectionManager`]. Inbound
//! messages are turned into typed [`Event`]s synchronously inside
//! [`poll_events`](MessageRouter::poll_events); nothing is delivered through
//! callbacks.

use std::fmt;

use crate::catalog::{SongCatalog, decode_catalog};
use crate::clock::Clock;
use crate::connection::{Attach, ConnectError, ConnectionManager};
use crate::error::{DiscoError, Result};
use crate::link::{BrokerLink, LinkError};
use crate::state::AnimationMode;

/// Which side of the link a node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Controller,
    Renderer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Controller => write!(f, "controller"),
            Role::Renderer => write!(f, "renderer"),
        }
    }
}

/// Full topic names under one account namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub animation: String,
    pub song_name: String,
    pub song_list: String,
    /// Asks the broker to resend the retained catalog.
    pub song_list_get: String,
}

impl Topics {
    pub fn new(base: &str) -> Self {
        let feed = |name: &str| format!("{base}/feeds/{name}");
        let song_list = feed("song_list");
        Topics {
            animation: feed("disco_animation"),
            song_name: feed("disco_song_name"),
            song_list_get: format!("{song_list}/get"),
            song_list,
        }
    }

    /// Feeds a node listens to.
    pub fn subscriptions(&self, role: Role) -> Vec<&str> {
        match role {
            Role::Controller => vec![&self.song_list],
            Role::Renderer => vec![&self.animation, &self.song_name],
        }
    }
}

/// Typed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ModeReceived(AnimationMode),
    SongRequested(String),
    CatalogReceived(SongCatalog),
}

pub struct MessageRouter<L: BrokerLink, C: Clock> {
    conn: ConnectionManager<L, C>,
    topics: Topics,
    role: Role,
}

impl<L: BrokerLink, C: Clock> MessageRouter<L, C> {
    pub fn new(conn: ConnectionManager<L, C>, topics: Topics, role: Role) -> Self {
        MessageRouter { conn, topics, role }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn connection(&self) -> &ConnectionManager<L, C> {
        &self.conn
    }

    pub fn is_attached(&self) -> bool {
        self.conn.is_attached()
    }

    /// Map a raw message onto an event. Unknown topics and unrecognized
    /// mode tokens yield `None`.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Option<Event> {
        let payload = String::from_utf8_lossy(payload);
        if topic == self.topics.animation {
            match AnimationMode::from_wire(&payload) {
                Some(mode) => Some(Event::ModeReceived(mode)),
                None => {
                    log::warn!("[router] unrecognized animation {payload:?}, keeping current mode");
                    None
                }
            }
        } else if topic == self.topics.song_name {
            Some(Event::SongRequested(payload.into_owned()))
        } else if topic == self.topics.song_list {
            Some(Event::CatalogReceived(decode_catalog(&payload)))
        } else {
            log::debug!("[router] ignoring message on {topic}");
            None
        }
    }

    /// Subscribe to this role's feeds on the current session.
    pub fn subscribe(&mut self) -> std::result::Result<(), LinkError> {
        let topics: Vec<String> = self
            .topics
            .subscriptions(self.role)
            .into_iter()
            .map(str::to_string)
            .collect();
        for topic in &topics {
            self.conn.subscribe(topic)?;
            log::debug!("[router] subscribed to {topic}");
        }
        Ok(())
    }

    /// First attach at boot; subscribes on success.
    pub fn connect_at_boot(&mut self) -> std::result::Result<Attach, ConnectError> {
        let attach = self.conn.connect_at_boot()?;
        self.after_attach(attach)
    }

    /// Idempotent reconnect. A fresh session is re-subscribed before
    /// returning.
    pub fn ensure_connected(&mut self) -> std::result::Result<Attach, ConnectError> {
        let attach = self.conn.ensure_connected()?;
        self.after_attach(attach)
    }

    fn after_attach(&mut self, attach: Attach) -> std::result::Result<Attach, ConnectError> {
        if attach == Attach::Attached {
            self.subscribe().map_err(ConnectError::Retryable)?;
        }
        Ok(attach)
    }

    pub fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> std::result::Result<(), LinkError> {
        log::debug!("[router] publish {topic} = {payload:?}");
        self.conn.publish(topic, payload, retain)
    }

    /// Publish every message in order. On failure, reconnect and retry the
    /// whole batch exactly once.
    pub fn publish_batch(&mut self, messages: &[(&str, &str)], retain: bool) -> Result<()> {
        let first = match self.try_batch(messages, retain) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        log::warn!("[router] publish failed ({first}), reconnecting and retrying once");
        match self.ensure_connected() {
            Ok(_) => {}
            Err(ConnectError::Fatal(e)) => {
                return Err(DiscoError::RestartRequired(format!("reconnect: {e}")));
            }
            Err(e) => log::warn!("[router] reconnect before retry failed: {e}"),
        }
        self.try_batch(messages, retain).map_err(|e| {
            log::error!("[router] retry failed, giving up: {e}");
            DiscoError::Link(e)
        })
    }

    fn try_batch(&mut self, messages: &[(&str, &str)], retain: bool) -> std::result::Result<(), LinkError> {
        for (topic, payload) in messages {
            self.publish(topic, payload, retain)?;
        }
        Ok(())
    }

    /// Pump broker I/O and decode whatever arrived.
    pub fn poll_events(&mut self) -> std::result::Result<Vec<Event>, LinkError> {
        let inbound = self.conn.pump()?;
        Ok(inbound
            .iter()
            .filter_map(|m| {
                log::debug!("[router] {} <- {:?}", m.topic, m.payload);
                self.dispatch(&m.topic, m.payload.as_bytes())
            })
            .collect())
    }

    pub fn disconnect(&mut self) {
        self.conn.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mock::ManualClock;
    use crate::link::mock::MockLink;
    use crate::reconnect::ReconnectConfig;
    use std::time::Duration;

    fn router(role: Role) -> MessageRouter<MockLink, ManualClock> {
        let conn = ConnectionManager::new(
            MockLink::new(),
            ManualClock::new(),
            ReconnectConfig::default(),
            3,
        );
        MessageRouter::new(conn, Topics::new("stu"), role)
    }

    #[test]
    fn topic_names() {
        let t = Topics::new("stu");
        assert_eq!(t.animation, "stu/feeds/disco_animation");
        assert_eq!(t.song_name, "stu/feeds/disco_song_name");
        assert_eq!(t.song_list, "stu/feeds/song_list");
        assert_eq!(t.song_list_get, "stu/feeds/song_list/get");
    }

    #[test]
    fn dispatch_modes() {
        let r = router(Role::Renderer);
        assert_eq!(
            r.dispatch("stu/feeds/disco_animation", b"Rainbow"),
            Some(Event::ModeReceived(AnimationMode::Rainbow))
        );
        assert_eq!(r.dispatch("stu/feeds/disco_animation", b"Strobe"), None);
    }

    #[test]
    fn dispatch_song_is_verbatim() {
        let r = router(Role::Renderer);
        assert_eq!(
            r.dispatch("stu/feeds/disco_song_name", b"Le_Freak.wav"),
            Some(Event::SongRequested("Le_Freak.wav".into()))
        );
    }

    #[test]
    fn dispatch_catalog_decodes() {
        let r = router(Role::Controller);
        assert_eq!(
            r.dispatch("stu/feeds/song_list", b"['a.wav', 'disco_stu.wav']"),
            Some(Event::CatalogReceived(SongCatalog::new(["a.wav"])))
        );
    }

    #[test]
    fn dispatch_unknown_topic_is_ignored() {
        let r = router(Role::Controller);
        assert_eq!(r.dispatch("stu/feeds/other", b"x"), None);
        assert_eq!(r.dispatch("stu/feeds/disco_animation/extra", b"Solid"), None);
    }

    #[test]
    fn dispatch_invalid_utf8_is_lossy() {
        let r = router(Role::Renderer);
        assert!(matches!(
            r.dispatch("stu/feeds/disco_song_name", &[0x61, 0xFF]),
            Some(Event::SongRequested(s)) if s.starts_with('a')
        ));
    }

    #[test]
    fn fresh_attach_subscribes_role_feeds() {
        let mut r = router(Role::Renderer);
        let h = r.connection().link().handle();
        r.ensure_connected().unwrap();
        assert_eq!(
            *h.subscriptions.borrow(),
            ["stu/feeds/disco_animation", "stu/feeds/disco_song_name"]
        );
        r.ensure_connected().unwrap();
        assert_eq!(h.subscriptions.borrow().len(), 2, "no resubscribe when attached");
    }

    #[test]
    fn controller_subscribes_to_catalog_only() {
        let mut r = router(Role::Controller);
        r.connect_at_boot().unwrap();
        let h = r.connection().link().handle();
        assert_eq!(*h.subscriptions.borrow(), ["stu/feeds/song_list"]);
    }

    #[test]
    fn batch_retries_once_after_reconnect() {
        let mut r = router(Role::Controller);
        r.ensure_connected().unwrap();
        let h = r.connection().link().handle();
        h.fail_next_publish(LinkError::Disconnected("socket reset".into()));

        r.publish_batch(&[("stu/feeds/disco_animation", "Rainbow"), ("stu/feeds/disco_song_name", "a.wav")], false)
            .unwrap();
        assert_eq!(h.payloads_for("stu/feeds/disco_animation"), ["Rainbow"]);
        assert_eq!(h.payloads_for("stu/feeds/disco_song_name"), ["a.wav"]);
        assert_eq!(h.broker_attaches.get(), 2);
    }

    #[test]
    fn batch_gives_up_after_second_failure() {
        let mut r = router(Role::Controller);
        r.ensure_connected().unwrap();
        let h = r.connection().link().handle();
        h.fail_next_publish(LinkError::Disconnected("a".into()));
        h.fail_next_publish(LinkError::Disconnected("b".into()));
        h.fail_next_publish(LinkError::Disconnected("c".into()));

        let err = r.publish_batch(&[("stu/feeds/disco_animation", "Solid")], false).unwrap_err();
        assert!(!err.requires_restart());
        // Third scripted failure is still queued: only two attempts were made.
        assert_eq!(h.publish_failures.borrow().len(), 1);
    }

    #[test]
    fn batch_escalates_fatal_reconnect() {
        let conn = ConnectionManager::new(
            MockLink::new(),
            ManualClock::new(),
            ReconnectConfig {
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                multiplier: 2.0,
            },
            1,
        );
        let mut r = MessageRouter::new(conn, Topics::new("stu"), Role::Controller);
        r.ensure_connected().unwrap();
        let h = r.connection().link().handle();
        h.fail_next_publish(LinkError::Disconnected("eof".into()));
        h.fail_next_network(LinkError::Io(std::io::Error::other("radio")));

        let err = r.publish_batch(&[("stu/feeds/disco_animation", "Solid")], false).unwrap_err();
        assert!(err.requires_restart());
    }

    #[test]
    fn poll_events_decodes_in_order() {
        let mut r = router(Role::Renderer);
        r.ensure_connected().unwrap();
        let h = r.connection().link().handle();
        h.push_inbound("stu/feeds/disco_animation", "Rainbow");
        h.push_inbound("stu/feeds/disco_animation", "Disco");
        h.push_inbound("stu/feeds/disco_song_name", "b.wav");
        assert_eq!(
            r.poll_events().unwrap(),
            [
                Event::ModeReceived(AnimationMode::Rainbow),
                Event::SongRequested("b.wav".into())
            ]
        );
    }

    #[test]
    fn poll_events_dispatches_messages_received_before_a_drop() {
        let mut r = router(Role::Renderer);
        r.ensure_connected().unwrap();
        let h = r.connection().link().handle();
        h.push_inbound("stu/feeds/disco_animation", "Rainbow");
        h.fail_next_poll(LinkError::Disconnected("eof".into()));

        assert_eq!(r.poll_events().unwrap(), [Event::ModeReceived(AnimationMode::Rainbow)]);
        assert!(!r.is_attached());
    }
}
