//! A rate-limiting `Middleware`, adapted from the teacher gateway's
//! `proxy::filter::rate_limit` module. The core pipeline runner is
//! specified as synchronous per request (spec.md §4.3), so this uses
//! `std::sync::Mutex` and a background `std::thread` for GC instead of
//! the teacher's `tokio::sync::Mutex` + `tokio::spawn` — same algorithm,
//! blocking-safe primitives.
//!
//! Process-local state only: per spec.md §9 open questions, cross-process
//! correctness is not claimed, matching the teacher's own thread-local /
//! process-local rate limiter.

use crate::pipeline::{Middleware, MiddlewareOutcome};
use crate::value::{HandlerResult, Request, Response, RouteIdentifier};
use dashmap::DashMap;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    /// Token bucket: smooth rate limiting with burst.
    TokenBucket,
    /// Fixed-window-with-blending counter.
    SlidingWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKey {
    Route,
    RemoteAddr,
    Uri,
    HostUri,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub mode: RateLimitMode,
    pub rate: f64,
    pub burst: u64,
    pub count: u64,
    pub time_window_secs: u64,
    pub key: RateLimitKey,
    pub rejected_status: u16,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            mode: RateLimitMode::TokenBucket,
            rate: 100.0,
            burst: 100,
            count: 1000,
            time_window_secs: 1,
            key: RateLimitKey::HostUri,
            rejected_status: 429,
        }
    }
}

const GC_EXPIRE: Duration = Duration::from_secs(300);
const GC_INTERVAL: Duration = Duration::from_secs(60);
const MAX_ENTRIES: usize = 100_000;
const PRECISION: u64 = 1_000_000;

struct BucketInner {
    tokens: u64,
    last_refill: u64,
    rate_per_us: f64,
    max_tokens: u64,
}

struct Bucket {
    inner: Mutex<BucketInner>,
    last_access: AtomicU64,
}

struct WindowInner {
    current_count: u64,
    prev_count: u64,
    window_start: u64,
    max_count: u64,
    window_us: u64,
}

struct Window {
    inner: Mutex<WindowInner>,
    last_access: AtomicU64,
}

pub struct RateLimit {
    config: RateLimitConfig,
    buckets: DashMap<String, Arc<Bucket>>,
    windows: DashMap<String, Arc<Window>>,
}

impl RateLimit {
    pub fn new(config: RateLimitConfig) -> Arc<Self> {
        let limiter = Arc::new(Self {
            config,
            buckets: DashMap::new(),
            windows: DashMap::new(),
        });
        limiter.start_gc();
        limiter
    }

    fn start_gc(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        std::thread::spawn(move || loop {
            std::thread::sleep(GC_INTERVAL);
            let Some(limiter) = weak.upgrade() else {
                return;
            };
            limiter.evict_stale();
        });
    }

    fn evict_stale(&self) {
        let now = now_us();
        let expire_us = GC_EXPIRE.as_micros() as u64;

        self.buckets
            .retain(|_, v| now.saturating_sub(v.last_access.load(Ordering::Relaxed)) < expire_us);
        if self.buckets.len() > MAX_ENTRIES {
            self.force_evict_buckets(now);
        }

        self.windows
            .retain(|_, v| now.saturating_sub(v.last_access.load(Ordering::Relaxed)) < expire_us);
        if self.windows.len() > MAX_ENTRIES {
            self.force_evict_windows(now);
        }
    }

    fn force_evict_buckets(&self, now: u64) {
        let overflow = self.buckets.len().saturating_sub(MAX_ENTRIES);
        if overflow == 0 {
            return;
        }
        let mut entries: Vec<(String, u64)> = self
            .buckets
            .iter()
            .map(|r| (r.key().clone(), now.saturating_sub(r.value().last_access.load(Ordering::Relaxed))))
            .collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1));
        for (key, _) in entries.into_iter().take(overflow) {
            self.buckets.remove(&key);
        }
    }

    fn force_evict_windows(&self, now: u64) {
        let overflow = self.windows.len().saturating_sub(MAX_ENTRIES);
        if overflow == 0 {
            return;
        }
        let mut entries: Vec<(String, u64)> = self
            .windows
            .iter()
            .map(|r| (r.key().clone(), now.saturating_sub(r.value().last_access.load(Ordering::Relaxed))))
            .collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1));
        for (key, _) in entries.into_iter().take(overflow) {
            self.windows.remove(&key);
        }
    }

    fn check(&self, key: &str) -> bool {
        match self.config.mode {
            RateLimitMode::TokenBucket => self.check_token_bucket(key),
            RateLimitMode::SlidingWindow => self.check_sliding_window(key),
        }
    }

    fn check_token_bucket(&self, key: &str) -> bool {
        let rate = self.config.rate;
        let burst = self.config.burst.max(1);
        let max_tokens = (rate as u64 + burst) * PRECISION;
        let rate_per_us = rate / 1_000_000.0;

        let bucket = if let Some(entry) = self.buckets.get(key) {
            entry.value().clone()
        } else {
            self.buckets
                .entry(key.to_string())
                .or_insert_with(|| {
                    let now = now_us();
                    Arc::new(Bucket {
                        inner: Mutex::new(BucketInner {
                            tokens: max_tokens,
                            last_refill: now,
                            rate_per_us,
                            max_tokens,
                        }),
                        last_access: AtomicU64::new(now),
                    })
                })
                .clone()
        };

        bucket.last_access.store(now_us(), Ordering::Relaxed);

        let now = now_us();
        let mut b = bucket.inner.lock().unwrap();
        let elapsed = now.saturating_sub(b.last_refill);
        if elapsed > 0 {
            let refill = (elapsed as f64 * b.rate_per_us * PRECISION as f64) as u64;
            b.tokens = (b.tokens + refill).min(b.max_tokens);
            b.last_refill = now;
        }
        if b.tokens >= PRECISION {
            b.tokens -= PRECISION;
            true
        } else {
            false
        }
    }

    fn check_sliding_window(&self, key: &str) -> bool {
        let max_count = self.config.count.max(1);
        let window_us = self.config.time_window_secs * 1_000_000;

        let window = if let Some(entry) = self.windows.get(key) {
            entry.value().clone()
        } else {
            self.windows
                .entry(key.to_string())
                .or_insert_with(|| {
                    let now = now_us();
                    Arc::new(Window {
                        inner: Mutex::new(WindowInner {
                            current_count: 0,
                            prev_count: 0,
                            window_start: now,
                            max_count,
                            window_us,
                        }),
                        last_access: AtomicU64::new(now),
                    })
                })
                .clone()
        };

        window.last_access.store(now_us(), Ordering::Relaxed);

        let now = now_us();
        let mut w = window.inner.lock().unwrap();
        while now.saturating_sub(w.window_start) >= w.window_us {
            w.prev_count = w.current_count;
            w.current_count = 0;
            w.window_start += w.window_us;
        }

        let elapsed_in_window = now.saturating_sub(w.window_start);
        let weight = if w.window_us > 0 {
            1.0 - (elapsed_in_window as f64 / w.window_us as f64)
        } else {
            0.0
        };
        let estimated = (w.prev_count as f64 * weight) as u64 + w.current_count;

        if estimated < w.max_count {
            w.current_count += 1;
            true
        } else {
            false
        }
    }

    fn extract_key<'a>(&self, request: &'a Request) -> Cow<'a, str> {
        match self.config.key {
            RateLimitKey::Route => request
                .extensions
                .get::<RouteIdentifier>()
                .map(|r| Cow::Owned(r.0.clone()))
                .unwrap_or(Cow::Borrowed(request.path.as_str())),
            RateLimitKey::RemoteAddr => Cow::Owned(
                request
                    .client_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            RateLimitKey::Uri => Cow::Borrowed(request.path.as_str()),
            RateLimitKey::HostUri => Cow::Owned(format!("{}{}", request.host, request.path)),
        }
    }
}

impl Middleware for RateLimit {
    fn call(&self, request: &mut Request, _response: &mut Response) -> MiddlewareOutcome {
        let key = self.extract_key(request);
        if self.check(&key) {
            metrics::counter!("waypoint_rate_limit_allowed_total").increment(1);
            MiddlewareOutcome::Continue
        } else {
            metrics::counter!("waypoint_rate_limit_rejected_total").increment(1);
            MiddlewareOutcome::Halt(HandlerResult::Triple {
                status: self.config.rejected_status,
                headers: Default::default(),
                body: b"{\"error\":\"too many requests\"}".to_vec(),
            })
        }
    }

    fn name(&self) -> &str {
        "rate_limit"
    }
}

fn now_us() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request_for(path: &str) -> Request {
        Request::new(Method::GET, "example.com", path)
    }

    #[test]
    fn token_bucket_allows_burst_then_rejects() {
        let limiter = RateLimit::new(RateLimitConfig {
            mode: RateLimitMode::TokenBucket,
            rate: 1.0,
            burst: 1,
            key: RateLimitKey::Uri,
            ..Default::default()
        });
        let mut allowed = 0;
        for _ in 0..100 {
            let mut req = request_for("/exhaust");
            let mut resp = Response::new();
            if matches!(limiter.call(&mut req, &mut resp), MiddlewareOutcome::Continue) {
                allowed += 1;
            }
        }
        assert!(allowed < 50, "expected most requests rejected, got {allowed} allowed");
    }

    #[test]
    fn sliding_window_rejects_after_limit() {
        let limiter = RateLimit::new(RateLimitConfig {
            mode: RateLimitMode::SlidingWindow,
            count: 5,
            time_window_secs: 60,
            key: RateLimitKey::Uri,
            ..Default::default()
        });
        for _ in 0..5 {
            let mut req = request_for("/window");
            let mut resp = Response::new();
            assert!(matches!(limiter.call(&mut req, &mut resp), MiddlewareOutcome::Continue));
        }
        let mut req = request_for("/window");
        let mut resp = Response::new();
        assert!(matches!(limiter.call(&mut req, &mut resp), MiddlewareOutcome::Halt(_)));
    }

    #[test]
    fn different_keys_tracked_independently() {
        let limiter = RateLimit::new(RateLimitConfig {
            mode: RateLimitMode::SlidingWindow,
            count: 1,
            time_window_secs: 60,
            key: RateLimitKey::Uri,
            ..Default::default()
        });
        let mut a = request_for("/a");
        let mut b = request_for("/b");
        let mut resp = Response::new();
        assert!(matches!(limiter.call(&mut a, &mut resp), MiddlewareOutcome::Continue));
        assert!(matches!(limiter.call(&mut b, &mut resp), MiddlewareOutcome::Continue));
        assert!(matches!(limiter.call(&mut a, &mut resp), MiddlewareOutcome::Halt(_)));
    }
}
