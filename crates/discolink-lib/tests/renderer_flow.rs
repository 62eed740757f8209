//! Integration tests: Renderer node driven end-to-end with test doubles.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use discolink_lib::animation::BLACK;
use discolink_lib::animation::strip::mock::{MockStrip, MockStripState};
use discolink_lib::clock::mock::ManualClock;
use discolink_lib::config::Config;
use discolink_lib::hal::mock::MockStorage;
use discolink_lib::link::LinkError;
use discolink_lib::link::mock::{MockLink, MockLinkState};
use discolink_lib::node::{Node, Renderer, RendererParts};
use discolink_lib::playback::AudioError;
use discolink_lib::playback::mock::{MockVoice, MockVoiceState, VoiceOp};
use discolink_lib::state::AnimationMode;

const ANIMATION: &str = "stu/feeds/disco_animation";
const SONG_NAME: &str = "stu/feeds/disco_song_name";
const SONG_LIST: &str = "stu/feeds/song_list";
const COOLDOWN: Duration = Duration::from_secs(10);

type TestRenderer = Renderer<MockLink, ManualClock, MockStrip, MockVoice, MockStorage>;

struct Rig {
    node: TestRenderer,
    link: Rc<MockLinkState>,
    voice: Rc<MockVoiceState>,
    strip: Rc<MockStripState>,
    clock: ManualClock,
}

fn config() -> Config {
    Config {
        username: "stu".into(),
        songs_dir: "/sd/songs".into(),
        ..Config::default()
    }
}

fn rig_with(config: Config, storage: MockStorage) -> Rig {
    let clock = ManualClock::new();
    let link = MockLink::new();
    let link_state = link.handle();
    let voice = MockVoice::new();
    let voice_state = voice.handle();
    // The boot self-test sound ends after a few polls; songs play on.
    voice_state.finish_after(3);
    let strip = MockStrip::new(config.renderer_pixels);
    let strip_state = strip.handle();
    let parts = RendererParts {
        strip,
        voice,
        storage,
    };
    let node = Renderer::new(&config, link, clock.clone(), parts).unwrap();
    Rig {
        node,
        link: link_state,
        voice: voice_state,
        strip: strip_state,
        clock,
    }
}

fn songs() -> MockStorage {
    MockStorage::with_files(["._a.wav", "a.wav", "b.wav", "disco_stu.wav"])
}

fn booted() -> Rig {
    let mut rig = rig_with(config(), songs());
    rig.node.boot().unwrap();
    rig
}

fn song(name: &str) -> PathBuf {
    PathBuf::from("/sd/songs").join(name)
}

// ── Boot ──

#[test]
fn boot_publishes_retained_catalog() {
    let rig = booted();
    let published = rig.link.published.borrow();
    let catalog = published.iter().find(|p| p.topic == SONG_LIST).unwrap();
    assert_eq!(catalog.payload, "['a.wav', 'b.wav', 'disco_stu.wav']");
    assert!(catalog.retain);
    assert_eq!(
        *rig.link.subscriptions.borrow(),
        [ANIMATION, SONG_NAME]
    );
}

#[test]
fn boot_blocks_on_self_test_sound() {
    let rig = booted();
    assert_eq!(rig.voice.plays(), [song("disco_stu.wav")]);
    assert!(!rig.node.playback().is_playing());
    assert_eq!(rig.clock.sleeps_of(Duration::from_millis(10)), 3);
    assert!(rig.strip.last_frame().unwrap().iter().all(|p| *p == BLACK));
}

#[test]
fn boot_skips_self_test_when_disabled() {
    let mut rig = rig_with(
        Config {
            self_test_file: String::new(),
            ..config()
        },
        songs(),
    );
    rig.node.boot().unwrap();
    assert!(rig.voice.plays().is_empty());
}

#[test]
fn boot_network_failure_requires_restart() {
    let mut rig = rig_with(config(), songs());
    rig.link
        .fail_next_network(LinkError::NetworkUnavailable("no access point".into()));
    assert!(rig.node.boot().unwrap_err().requires_restart());
    assert!(rig.link.published.borrow().is_empty());
}

#[test]
fn boot_storage_failure_restarts_after_cooldown() {
    let mut rig = rig_with(config(), MockStorage::failing());
    assert!(rig.node.boot().unwrap_err().requires_restart());
    assert_eq!(rig.clock.sleeps_of(COOLDOWN), 1);
}

#[test]
fn catalog_published_once_broker_comes_back() {
    let mut rig = rig_with(config(), songs());
    rig.link
        .fail_next_broker(LinkError::BrokerRefused("connack: server unavailable".into()));
    rig.link
        .fail_next_broker(LinkError::BrokerRefused("connack: server unavailable".into()));
    rig.node.boot().unwrap();
    assert!(rig.link.payloads_for(SONG_LIST).is_empty());

    for _ in 0..200 {
        rig.node.tick().unwrap();
        if !rig.link.payloads_for(SONG_LIST).is_empty() {
            break;
        }
    }
    assert_eq!(rig.link.payloads_for(SONG_LIST).len(), 1);
    rig.node.tick().unwrap();
    assert_eq!(rig.link.payloads_for(SONG_LIST).len(), 1, "published only once");
}

// ── Playback ──

#[test]
fn song_request_plays_from_songs_dir() {
    let mut rig = booted();
    rig.link.push_inbound(SONG_NAME, "b.wav");
    rig.node.tick().unwrap();
    assert_eq!(rig.voice.plays().last(), Some(&song("b.wav")));
    assert!(rig.node.playback().is_playing());
    assert_eq!(rig.node.state().last_requested(), Some("b.wav"));
}

#[test]
fn new_song_stops_current_one_first() {
    let mut rig = booted();
    rig.link.push_inbound(SONG_NAME, "a.wav");
    rig.node.tick().unwrap();
    rig.link.push_inbound(SONG_NAME, "b.wav");
    rig.node.tick().unwrap();

    let ops = rig.voice.ops.borrow();
    let tail = &ops[ops.len() - 3..];
    assert!(matches!(&tail[0], VoiceOp::Play { path, .. } if *path == song("a.wav")));
    assert_eq!(tail[1], VoiceOp::Stop);
    assert!(matches!(&tail[2], VoiceOp::Play { path, level } if *path == song("b.wav") && *level == 1.0));
}

#[test]
fn storage_fault_during_play_requires_one_restart() {
    let mut rig = booted();
    rig.voice
        .fail_next_play(AudioError::Storage(std::io::Error::other("sd: read error")));
    rig.link.push_inbound(SONG_NAME, "a.wav");
    let err = rig.node.tick().unwrap_err();
    assert!(err.requires_restart());
    assert_eq!(rig.clock.sleeps_of(COOLDOWN), 1);
}

#[test]
fn decode_glitch_does_not_restart() {
    let mut rig = booted();
    rig.voice
        .fail_next_play(AudioError::Decode("truncated data chunk".into()));
    rig.link.push_inbound(SONG_NAME, "a.wav");
    rig.node.tick().unwrap();
    assert_eq!(rig.clock.sleeps_of(COOLDOWN), 0);
    assert!(!rig.node.playback().is_playing());

    // The next request still works.
    rig.link.push_inbound(SONG_NAME, "b.wav");
    rig.node.tick().unwrap();
    assert!(rig.node.playback().is_playing());
}

#[test]
fn path_escape_is_refused_without_restart() {
    let mut rig = booted();
    rig.link.push_inbound(SONG_NAME, "../../etc/passwd");
    rig.node.tick().unwrap();
    assert_eq!(rig.voice.plays(), [song("disco_stu.wav")]);
}

// ── Modes ──

#[test]
fn solid_stops_voice_and_clears_strip() {
    let mut rig = booted();
    rig.link.push_inbound(SONG_NAME, "a.wav");
    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.node.tick().unwrap();
    assert!(rig.node.playback().is_playing());

    rig.link.push_inbound(ANIMATION, "Solid");
    rig.node.tick().unwrap();
    assert_eq!(rig.node.state().mode(), AnimationMode::Solid);
    assert!(!rig.node.playback().is_playing());
    assert!(rig.strip.last_frame().unwrap().iter().all(|p| *p == BLACK));
}

#[test]
fn rainbow_sweeps_then_animates_each_tick() {
    let mut rig = booted();
    let before = rig.strip.frame_count();
    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.node.tick().unwrap();
    // 14 sweep blocks plus the first rainbow frame.
    assert_eq!(rig.strip.frame_count(), before + 14 + 1);

    rig.clock.advance(Duration::from_millis(50));
    rig.node.tick().unwrap();
    assert_eq!(rig.strip.frame_count(), before + 14 + 2);
}

#[test]
fn repeated_rainbow_replays_the_sweep() {
    let mut rig = booted();
    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.node.tick().unwrap();
    let frames = rig.strip.frame_count();

    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.node.tick().unwrap();
    assert_eq!(rig.strip.frame_count(), frames + 14 + 1);
}

#[test]
fn mode_received_just_before_a_drop_is_applied() {
    let mut rig = booted();
    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.link.fail_next_poll(LinkError::Disconnected("eof".into()));
    rig.node.tick().unwrap();
    assert_eq!(rig.node.state().mode(), AnimationMode::Rainbow);
    // The session is restored in the same tick.
    assert!(rig.node.router().is_attached());
}

#[test]
fn unrecognized_mode_keeps_current_mode() {
    let mut rig = booted();
    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.node.tick().unwrap();
    let frames = rig.strip.frame_count();

    rig.link.push_inbound(ANIMATION, "Strobe");
    rig.node.tick().unwrap();
    assert_eq!(rig.node.state().mode(), AnimationMode::Rainbow);
    assert_eq!(rig.strip.frame_count(), frames, "no sweep for unknown token");
}

#[test]
fn strip_failure_is_logged_not_fatal() {
    let mut rig = booted();
    rig.strip.fail_next_shows(100);
    rig.link.push_inbound(ANIMATION, "Rainbow");
    rig.node.tick().unwrap();
    rig.clock.advance(Duration::from_millis(50));
    rig.node.tick().unwrap();
    assert_eq!(rig.node.state().mode(), AnimationMode::Rainbow);
}
