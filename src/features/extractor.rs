//! Feature extraction: request event + rolling window → fixed 6-dim vector.

use super::{idx, FeatureVector, RollingWindows, FEATURE_DIM};
use crate::events::{ParsedUrl, RequestEvent, Scheme};

/// URL-shortener substrings that raise the static domain heuristic.
const SHORTENER_HOSTS: [&str; 6] = ["bit.ly", "tinyurl.com", "t.co", "goo.gl", "ow.ly", "is.gd"];

const DOMAIN_RISK_SHORTENER: f32 = 4.0;
const DOMAIN_RISK_PLAIN_HTTP: f32 = 3.0;
const DOMAIN_RISK_BASELINE: f32 = 1.0;

pub struct FeatureExtractor {
    windows: RollingWindows,
}

impl FeatureExtractor {
    pub fn new(window_ms: i64, max_domains: usize) -> Self {
        Self {
            windows: RollingWindows::new(window_ms, max_domains),
        }
    }

    /// Derive the feature vector for one event. The only side effect is the
    /// rolling-window mutation for the event's domain; the caller is expected
    /// to have parsed the URL already so a malformed event never touches
    /// window state.
    pub fn extract(
        &self,
        event: &RequestEvent,
        parsed: &ParsedUrl,
        behavior_deviation: f32,
    ) -> FeatureVector {
        let now_ms = event.ts.timestamp_millis();
        let frequency = self.windows.observe(&parsed.host, now_ms) as f32;

        let packet_size = event
            .request_body
            .as_ref()
            .map(|b| b.len() as f32)
            .unwrap_or(0.0);

        let mut values = [0.0f32; FEATURE_DIM];
        values[idx::PACKET_SIZE] = packet_size;
        values[idx::FREQUENCY] = frequency;
        values[idx::ENTROPY] = shannon_entropy(&event.url);
        values[idx::DOMAIN_RISK] = score_domain(&event.url, parsed.scheme);
        values[idx::BEHAVIOR_DEVIATION] = behavior_deviation;

        FeatureVector {
            values,
            domain: parsed.host.clone(),
            event_id: event.id.clone(),
            ts: now_ms,
        }
    }

    pub fn tracked_domains(&self) -> usize {
        self.windows.tracked_domains()
    }
}

/// Shannon entropy (base 2) of the character distribution of `s`.
pub fn shannon_entropy(s: &str) -> f32 {
    let len = s.chars().count();
    if len == 0 {
        return 0.0;
    }
    let mut counts: std::collections::HashMap<char, u32> = std::collections::HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }
    let len = len as f64;
    let h: f64 = counts
        .values()
        .map(|&n| {
            let p = n as f64 / len;
            -p * p.log2()
        })
        .sum();
    h as f32
}

/// Static domain heuristic: shorteners score highest, plain HTTP above the
/// HTTPS baseline.
fn score_domain(url: &str, scheme: Scheme) -> f32 {
    if SHORTENER_HOSTS.iter().any(|s| url.contains(s)) {
        return DOMAIN_RISK_SHORTENER;
    }
    if scheme == Scheme::Http {
        return DOMAIN_RISK_PLAIN_HTTP;
    }
    DOMAIN_RISK_BASELINE
}
