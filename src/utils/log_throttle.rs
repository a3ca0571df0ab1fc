use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct WindowState {
    window_started_at: Instant,
    suppressed: u64,
}

/// Rate-limits repetitive log lines per key.
///
/// Each key gets a window of `interval`: the first event in a window is
/// emitted, the rest are counted and reported with the next emitted event.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    windows: Mutex<HashMap<&'static str, WindowState>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        LogThrottle {
            interval,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Some(suppressed_count)` when a log for `key` should be emitted,
    /// otherwise `None` and the event is counted as suppressed.
    pub fn should_emit(&self, key: &'static str) -> Option<u64> {
        let mut map = match self.windows.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock only loses counters.
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();

        match map.get_mut(key) {
            Some(state) => {
                if now.duration_since(state.window_started_at) >= self.interval {
                    let suppressed = state.suppressed;
                    state.window_started_at = now;
                    state.suppressed = 0;
                    Some(suppressed)
                } else {
                    state.suppressed += 1;
                    None
                }
            }
            None => {
                map.insert(
                    key,
                    WindowState {
                        window_started_at: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }
}
