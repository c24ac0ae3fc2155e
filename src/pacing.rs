//! Cooperative throttles for outbound probing.
//!
//! Mail servers and verification APIs flag bursts of probes as abuse. A
//! [`Pacer`] is consulted before each outbound unit of work and blocks the
//! calling thread for as long as the policy requires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

pub trait Pacer: Send + Sync {
    fn pace(&self);
}

/// Pacing policy as plain configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    #[default]
    None,
    /// Sleep `delay` before every item except the first.
    FixedDelay(Duration),
    /// At least `interval` between consecutive items, across threads.
    MinInterval(Duration),
    /// Bursts of up to `burst` items, refilled one token per `per`.
    TokenBucket { burst: u32, per: Duration },
}

impl Pacing {
    pub fn build(self) -> Box<dyn Pacer> {
        match self {
            Self::None => Box::new(Unpaced),
            Self::FixedDelay(delay) => Box::new(FixedDelay::new(delay)),
            Self::MinInterval(interval) => Box::new(MinInterval::new(interval)),
            Self::TokenBucket { burst, per } => Box::new(TokenBucket::new(burst, per)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

impl Pacer for Unpaced {
    fn pace(&self) {}
}

#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    started: AtomicBool,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicBool::new(false),
        }
    }
}

impl Pacer for FixedDelay {
    fn pace(&self) {
        if self.started.swap(true, Ordering::AcqRel) && !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

#[derive(Debug)]
pub struct MinInterval {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }
}

impl Pacer for MinInterval {
    fn pace(&self) {
        // Lock held across the sleep: callers are served one at a time.
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                thread::sleep(ready_at - now);
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    burst: f64,
    per: Duration,
    state: Mutex<Bucket>,
}

impl TokenBucket {
    pub fn new(burst: u32, per: Duration) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            burst,
            per,
            state: Mutex::new(Bucket {
                tokens: burst,
                refilled_at: Instant::now(),
            }),
        }
    }
}

impl Pacer for TokenBucket {
    fn pace(&self) {
        let mut bucket = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.per.is_zero() {
            return;
        }
        let per = self.per.as_secs_f64();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed / per).min(self.burst);
        bucket.refilled_at = now;
        if bucket.tokens < 1.0 {
            let wait = Duration::from_secs_f64((1.0 - bucket.tokens) * per);
            thread::sleep(wait);
            bucket.tokens = 1.0;
            bucket.refilled_at = Instant::now();
        }
        bucket.tokens -= 1.0;
    }
}
