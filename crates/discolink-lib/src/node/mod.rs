//! Node main loops.
//!
//! A node is booted once and then ticked until the shared running flag is
//! cleared. Each tick is one pass of the cooperative scheduler: broker pump,
//! connection check, input, render. Only [`DiscoError::RestartRequired`]
//! escapes [`run`]; everything else is logged and the loop carries on.

pub mod controller;
pub mod renderer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::clock::Clock;
use crate::connection::{Attach, ConnectError};
use crate::error::{DiscoError, Result};
use crate::link::BrokerLink;
use crate::router::{MessageRouter, Role};

pub use controller::{Controller, ControllerParts};
pub use renderer::{Renderer, RendererParts};

/// Longest a tick idles while reconnect backoff is in effect.
pub const OFFLINE_IDLE: Duration = Duration::from_millis(20);

pub trait Node {
    fn role(&self) -> Role;
    /// One-time startup sequence. May block (attach, self-test, sweep).
    fn boot(&mut self) -> Result<()>;
    /// One main-loop iteration.
    fn tick(&mut self) -> Result<()>;
    /// Release outputs and close the broker session.
    fn shutdown(&mut self);
}

/// Boot `node` and tick it until `running` is cleared.
pub fn run<N: Node>(node: &mut N, running: &AtomicBool) -> Result<()> {
    log::info!("[node] starting {}", node.role());
    if let Err(e) = node.boot() {
        node.shutdown();
        return Err(e);
    }
    while running.load(Ordering::SeqCst) {
        if let Err(e) = node.tick() {
            if e.requires_restart() {
                node.shutdown();
                return Err(e);
            }
            log::warn!("[node] {e}");
        }
    }
    log::info!("[node] stopping {}", node.role());
    node.shutdown();
    Ok(())
}

/// Connection health check for one tick. Returns `true` when a new broker
/// session was opened.
pub(crate) fn maintain_link<L: BrokerLink, C: Clock>(
    router: &mut MessageRouter<L, C>,
    clock: &C,
) -> Result<bool> {
    match router.ensure_connected() {
        Ok(attach) => Ok(attach == Attach::Attached),
        Err(ConnectError::Fatal(e)) => Err(DiscoError::RestartRequired(format!("link: {e}"))),
        Err(ConnectError::BackingOff(wait)) => {
            clock.sleep(wait.min(OFFLINE_IDLE));
            Ok(false)
        }
        Err(ConnectError::Retryable(_)) => Ok(false),
    }
}

/// Boot-time attach: only a fatal failure stops the boot.
pub(crate) fn attach_at_boot<L: BrokerLink, C: Clock>(router: &mut MessageRouter<L, C>) -> Result<()> {
    match router.connect_at_boot() {
        Ok(_) => Ok(()),
        Err(ConnectError::Fatal(e)) => Err(DiscoError::RestartRequired(format!("boot attach: {e}"))),
        Err(e) => {
            log::warn!("[node] starting offline: {e}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingNode<'a> {
        ticks: Cell<u32>,
        fail_at: Option<(u32, bool)>,
        stop_after: u32,
        running: &'a AtomicBool,
        shutdowns: u32,
    }

    impl Node for CountingNode<'_> {
        fn role(&self) -> Role {
            Role::Renderer
        }
        fn boot(&mut self) -> Result<()> {
            Ok(())
        }
        fn tick(&mut self) -> Result<()> {
            let n = self.ticks.get() + 1;
            self.ticks.set(n);
            if n >= self.stop_after {
                self.running.store(false, Ordering::SeqCst);
            }
            match self.fail_at {
                Some((at, true)) if at == n => Err(DiscoError::RestartRequired("boom".into())),
                Some((at, false)) if at == n => Err(DiscoError::Config("soft".into())),
                _ => Ok(()),
            }
        }
        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn node(running: &AtomicBool, fail_at: Option<(u32, bool)>) -> CountingNode<'_> {
        CountingNode {
            ticks: Cell::new(0),
            fail_at,
            stop_after: 5,
            running,
            shutdowns: 0,
        }
    }

    #[test]
    fn runs_until_flag_cleared() {
        let running = AtomicBool::new(true);
        let mut n = node(&running, None);
        run(&mut n, &running).unwrap();
        assert_eq!(n.ticks.get(), 5);
        assert_eq!(n.shutdowns, 1);
    }

    #[test]
    fn soft_errors_do_not_stop_loop() {
        let running = AtomicBool::new(true);
        let mut n = node(&running, Some((2, false)));
        run(&mut n, &running).unwrap();
        assert_eq!(n.ticks.get(), 5);
    }

    #[test]
    fn restart_error_escapes() {
        let running = AtomicBool::new(true);
        let mut n = node(&running, Some((3, true)));
        let err = run(&mut n, &running).unwrap_err();
        assert!(err.requires_restart());
        assert_eq!(n.ticks.get(), 3);
        assert_eq!(n.shutdowns, 1);
    }
}
