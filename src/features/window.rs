//! Per-domain rolling request-timestamp windows.
//!
//! Entries older than the window span are pruned before every read, so the
//! frequency feature never sees stale history. The domain map itself is
//! capped: when it fills up, domains whose newest timestamp has aged out of
//! the window are evicted, falling back to the quietest domain if every
//! entry is still live.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Trailing window span for the frequency feature.
pub const WINDOW_MS: i64 = 10_000;

pub struct RollingWindows {
    window_ms: i64,
    max_domains: usize,
    inner: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl RollingWindows {
    pub fn new(window_ms: i64, max_domains: usize) -> Self {
        Self {
            window_ms,
            max_domains: max_domains.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `domain` at `now_ms` and return the number of
    /// requests within the trailing window, the new one included.
    pub fn observe(&self, domain: &str, now_ms: i64) -> usize {
        let mut map = self.inner.lock().expect("window lock");

        if !map.contains_key(domain) && map.len() >= self.max_domains {
            Self::evict(&mut map, now_ms, self.window_ms, self.max_domains);
        }

        let window = map.entry(domain.to_string()).or_default();
        while window
            .front()
            .is_some_and(|&t| now_ms.saturating_sub(t) >= self.window_ms)
        {
            window.pop_front();
        }
        window.push_back(now_ms);
        window.len()
    }

    /// Number of domains currently tracked.
    pub fn tracked_domains(&self) -> usize {
        self.inner.lock().expect("window lock").len()
    }

    fn evict(
        map: &mut HashMap<String, VecDeque<i64>>,
        now_ms: i64,
        window_ms: i64,
        max_domains: usize,
    ) {
        map.retain(|_, w| {
            w.back()
                .is_some_and(|&t| now_ms.saturating_sub(t) < window_ms)
        });
        // All domains still live: drop the one least recently seen.
        while map.len() >= max_domains {
            let Some(oldest) = map
                .iter()
                .min_by_key(|(_, w)| w.back().copied().unwrap_or(i64::MIN))
                .map(|(d, _)| d.clone())
            else {
                break;
            };
            map.remove(&oldest);
        }
    }
}
