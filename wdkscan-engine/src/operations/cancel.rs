//! Cooperative cancellation and the timeout watchdog
//!
//! Container reads block and cannot be interrupted, so a scan only stops at
//! record boundaries, when it sees the token tripped. The watchdog is a
//! helper thread that trips the token once a deadline passes.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Shared flag checked between records
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trips a `CancelToken` when a timeout elapses; disarmed on drop
pub struct Watchdog {
    disarm: Arc<(Mutex<bool>, Condvar)>,
    fired: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start the watchdog thread
    pub fn arm(timeout: Duration, token: CancelToken) -> Self {
        let disarm = Arc::new((Mutex::new(false), Condvar::new()));
        let fired = Arc::new(AtomicBool::new(false));

        let thread_disarm = Arc::clone(&disarm);
        let thread_fired = Arc::clone(&fired);
        let spawned = thread::Builder::new()
            .name("wdkscan-watchdog".into())
            .spawn(move || {
                let (lock, cvar) = &*thread_disarm;
                let mut disarmed = lock.lock();
                let result = cvar.wait_while_for(&mut disarmed, |disarmed| !*disarmed, timeout);
                if result.timed_out() && !*disarmed {
                    warn!("timeout of {:?} reached, cancelling scan", timeout);
                    thread_fired.store(true, Ordering::SeqCst);
                    token.cancel();
                }
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("could not start watchdog thread: {}", e);
                None
            }
        };

        Watchdog {
            disarm,
            fired,
            handle,
        }
    }

    /// Whether the timeout elapsed before the watchdog was disarmed
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.disarm;
        *lock.lock() = true;
        cvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_watchdog_fires() {
        let token = CancelToken::new();
        let watchdog = Watchdog::arm(Duration::from_millis(20), token.clone());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !token.is_cancelled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(token.is_cancelled());
        assert!(watchdog.fired());
    }

    #[test]
    fn test_disarmed_watchdog_stays_quiet() {
        let token = CancelToken::new();
        let started = Instant::now();
        let watchdog = Watchdog::arm(Duration::from_secs(60), token.clone());
        drop(watchdog);

        // Drop joins promptly instead of waiting out the timeout
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(!token.is_cancelled());
    }
}
