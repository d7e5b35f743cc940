//! Stop flag that can also interrupt a sleeping thread.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared stop request. Clones observe the same flag.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every thread blocked in [`StopSignal::wait`]
    pub fn stop(&self) {
        let (flag, cvar) = &*self.inner;
        if let Ok(mut stopped) = flag.lock() {
            *stopped = true;
        }
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        let (flag, _) = &*self.inner;
        flag.lock().map(|stopped| *stopped).unwrap_or(true)
    }

    /// Sleep for `timeout` unless a stop is requested first.
    /// Returns true if the signal is stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let Ok(mut stopped) = flag.lock() else {
            return true;
        };
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = match cvar.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(_) => return true,
            };
        }
        *stopped
    }
}
