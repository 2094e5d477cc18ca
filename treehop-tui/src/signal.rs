//! Signal handling for the menu loop.
//!
//! Handlers only flip atomic flags. The input source polls them between
//! blocking reads and turns them into [`Input::Resize`] or
//! [`Input::Interrupted`], so nothing is drawn from signal context.
//!
//! [`Input::Resize`]: treehop_core::Input::Resize
//! [`Input::Interrupted`]: treehop_core::Input::Interrupted

use std::sync::{
    Arc, LazyLock,
    atomic::{AtomicBool, Ordering},
};

/// Set on SIGWINCH.
static RESIZE_PENDING: LazyLock<Arc<AtomicBool>> =
    LazyLock::new(|| Arc::new(AtomicBool::new(false)));
/// Set on SIGTERM or SIGHUP.
static TERMINATION_PENDING: LazyLock<Arc<AtomicBool>> =
    LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Serialises tests that touch the process-wide flags.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Whether a resize arrived since the last call.
pub fn take_resize() -> bool {
    RESIZE_PENDING.swap(false, Ordering::SeqCst)
}

/// Whether a termination request arrived since the last call.
pub fn take_termination() -> bool {
    TERMINATION_PENDING.swap(false, Ordering::SeqCst)
}

#[cfg(all(test, unix))]
pub(crate) fn notify_resize() {
    RESIZE_PENDING.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
mod unix {
    use super::{RESIZE_PENDING, TERMINATION_PENDING};
    use signal_hook::{
        SigId,
        consts::signal::{SIGHUP, SIGTERM, SIGWINCH},
        flag,
    };
    use std::{
        io,
        sync::{
            Arc, LazyLock, Mutex, PoisonError,
            atomic::{AtomicBool, Ordering},
        },
    };

    const TERMINATING: [libc::c_int; 2] = [SIGTERM, SIGHUP];

    /// While true, SIGTERM and SIGHUP take their default action.
    static DEFAULT_ARMED: LazyLock<Arc<AtomicBool>> =
        LazyLock::new(|| Arc::new(AtomicBool::new(true)));
    static DEFAULTS_REGISTERED: Mutex<bool> = Mutex::new(false);

    /// Once signal-hook owns a signal it never hands it back to the kernel,
    /// so termination outside the menu goes through these armed actions.
    fn register_defaults() -> io::Result<()> {
        let mut registered = DEFAULTS_REGISTERED
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*registered {
            for signal in TERMINATING {
                flag::register_conditional_default(signal, Arc::clone(&DEFAULT_ARMED))?;
            }
            *registered = true;
        }
        Ok(())
    }

    /// Registered flag actions. Dropping unregisters them.
    pub struct SignalBridge {
        ids: Vec<SigId>,
    }

    impl SignalBridge {
        pub fn install() -> io::Result<Self> {
            register_defaults()?;
            let mut bridge = Self {
                ids: Vec::with_capacity(3),
            };
            bridge
                .ids
                .push(flag::register(SIGWINCH, Arc::clone(&RESIZE_PENDING))?);
            for signal in TERMINATING {
                // On failure the bridge drops here and unregisters what it has.
                bridge
                    .ids
                    .push(flag::register(signal, Arc::clone(&TERMINATION_PENDING))?);
            }
            DEFAULT_ARMED.store(false, Ordering::SeqCst);
            log::debug!("signal handlers registered");
            Ok(bridge)
        }
    }

    impl Drop for SignalBridge {
        fn drop(&mut self) {
            for id in self.ids.drain(..) {
                signal_hook::low_level::unregister(id);
            }
            DEFAULT_ARMED.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(unix)]
pub use unix::SignalBridge;

/// Resize arrives through the terminal event stream on this platform.
#[cfg(not(unix))]
pub struct SignalBridge;

#[cfg(not(unix))]
impl SignalBridge {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use signal_hook::{
        consts::signal::{SIGTERM, SIGWINCH},
        low_level::raise,
    };
    use std::{thread, time::Duration};

    fn observed(take: fn() -> bool) -> bool {
        for _ in 0..20 {
            if take() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn raised_sigterm_sets_termination_flag() {
        let _signals = TEST_LOCK.lock().unwrap();
        take_termination();
        let bridge = SignalBridge::install().unwrap();
        raise(SIGTERM).unwrap();
        assert!(observed(take_termination), "SIGTERM was not received");
        assert!(!take_termination());
        drop(bridge);
    }

    #[test]
    fn raised_sigwinch_is_observed_until_uninstalled() {
        let _signals = TEST_LOCK.lock().unwrap();
        take_resize();
        let bridge = SignalBridge::install().unwrap();
        raise(SIGWINCH).unwrap();
        assert!(observed(take_resize), "SIGWINCH was not received");
        drop(bridge);

        raise(SIGWINCH).unwrap();
        assert!(!observed(take_resize));
    }

    #[test]
    fn reinstalling_after_drop_works() {
        let _signals = TEST_LOCK.lock().unwrap();
        drop(SignalBridge::install().unwrap());
        let bridge = SignalBridge::install().unwrap();
        raise(SIGWINCH).unwrap();
        assert!(observed(take_resize));
        drop(bridge);
    }
}
