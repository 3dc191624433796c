//! Per-route rate limiting
//!
//! Buckets are discovered from response headers: a route starts with a
//! single token and learns its real window once the first response comes
//! back. A refill task per bucket restores tokens after the server-reported
//! reset delay. A global limit freezes every route until its deadline.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use relay_core::error::GatewayError;
use reqwest::header::HeaderMap;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Margin added to the global deadline so requests resume strictly after it
const GLOBAL_DEADLINE_MARGIN: Duration = Duration::from_secs(1);

/// Rate limit state parsed from response headers
#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    /// Server-assigned bucket id, used only for diagnostics
    pub bucket: Option<String>,
    /// Tokens granted per window
    pub limit: Option<usize>,
    /// Tokens left in the current window
    pub remaining: Option<u64>,
    /// Time until the window resets
    pub reset_after: Option<Duration>,
    /// Time to wait after a 429
    pub retry_after: Option<Duration>,
    /// Whether a 429 applies to every route
    pub global: bool,
}

impl RateLimitInfo {
    /// Parse the X-RateLimit header family
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            bucket: header_str(headers, "x-ratelimit-bucket").map(str::to_string),
            limit: header_parse(headers, "x-ratelimit-limit"),
            remaining: header_parse(headers, "x-ratelimit-remaining"),
            reset_after: header_secs(headers, "x-ratelimit-reset-after"),
            retry_after: header_secs(headers, "retry-after"),
            global: header_str(headers, "x-ratelimit-global").is_some(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

/// Parse a seconds header that may carry fractions, rounding up so the
/// client never wakes before the server is ready.
fn header_secs(headers: &HeaderMap, name: &str) -> Option<Duration> {
    let secs: f64 = header_parse(headers, name)?;
    if secs < 0.0 {
        return None;
    }
    Some(Duration::from_millis((secs * 1000.0).ceil() as u64))
}

/// Refill order sent to a bucket's background task
struct Refill {
    limit: usize,
    reset_after: Duration,
}

/// One route's token bucket
struct Bucket {
    tokens: Arc<Semaphore>,
    refill_tx: mpsc::Sender<Refill>,
}

impl Bucket {
    /// Start a bucket with one token and spawn its refill task
    fn start(route: &'static str, shutdown: CancellationToken) -> Self {
        let tokens = Arc::new(Semaphore::new(1));
        let (refill_tx, refill_rx) = mpsc::channel(1);

        let task_tokens = tokens.clone();
        tokio::spawn(async move {
            refill_loop(route, task_tokens, refill_rx, shutdown).await;
        });

        Self { tokens, refill_tx }
    }
}

/// Restore a bucket's tokens after each server-reported reset delay
async fn refill_loop(
    route: &'static str,
    tokens: Arc<Semaphore>,
    mut refills: mpsc::Receiver<Refill>,
    shutdown: CancellationToken,
) {
    loop {
        let refill = tokio::select! {
            () = shutdown.cancelled() => return,
            refill = refills.recv() => match refill {
                Some(refill) => refill,
                None => return,
            },
        };

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(refill.reset_after) => {}
        }

        // Drain leftovers first so the bucket never exceeds its limit
        while let Ok(permit) = tokens.try_acquire() {
            permit.forget();
        }
        tokens.add_permits(refill.limit);
        trace!(route, limit = refill.limit, "Bucket refilled");
    }
}

/// Token-bucket limiter keyed by route
pub struct RateLimiter {
    buckets: DashMap<&'static str, Arc<Bucket>>,
    global_until: RwLock<Option<Instant>>,
    shutdown: CancellationToken,
}

impl RateLimiter {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            buckets: DashMap::new(),
            global_until: RwLock::new(None),
            shutdown,
        }
    }

    /// Take one token for the route, waiting out any global deadline and
    /// then the bucket itself. Returns `Canceled` once the client shuts
    /// down, including while blocked here.
    pub async fn acquire(&self, route: &'static str) -> Result<(), GatewayError> {
        self.wait_global().await?;

        let bucket = self
            .buckets
            .entry(route)
            .or_insert_with(|| Arc::new(Bucket::start(route, self.shutdown.clone())))
            .clone();

        tokio::select! {
            () = self.shutdown.cancelled() => Err(GatewayError::Canceled),
            permit = bucket.tokens.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(_) => Err(GatewayError::Canceled),
            },
        }
    }

    /// Apply header state from a completed response. A refill is scheduled
    /// at most once per window; extra responses in the same window are
    /// dropped by the full channel. A response without limit headers hands
    /// its token straight back so unlimited routes never starve.
    pub fn update(&self, route: &'static str, info: &RateLimitInfo) {
        let Some(bucket) = self.buckets.get(route) else {
            return;
        };

        let (Some(limit), Some(reset_after)) = (info.limit, info.reset_after) else {
            bucket.tokens.add_permits(1);
            return;
        };

        let scheduled = bucket
            .refill_tx
            .try_send(Refill { limit, reset_after })
            .is_ok();
        if scheduled {
            debug!(
                route,
                bucket = info.bucket.as_deref().unwrap_or("unknown"),
                limit,
                reset_after_ms = reset_after.as_millis() as u64,
                "Scheduled bucket refill"
            );
        }
    }

    /// Hand a token back when the request never produced a response
    pub fn release(&self, route: &'static str) {
        if let Some(bucket) = self.buckets.get(route) {
            bucket.tokens.add_permits(1);
        }
    }

    /// Freeze every route until the retry delay (plus margin) has passed
    pub fn set_global(&self, retry_after: Duration) {
        let deadline = Instant::now() + retry_after + GLOBAL_DEADLINE_MARGIN;
        let mut until = self.global_until.write();
        // Keep the later deadline if two 429s race
        match *until {
            Some(current) if current >= deadline => {}
            _ => *until = Some(deadline),
        }
    }

    /// Deadline currently blocking all routes, if any
    pub fn global_deadline(&self) -> Option<Instant> {
        *self.global_until.read()
    }

    async fn wait_global(&self) -> Result<(), GatewayError> {
        loop {
            let deadline = *self.global_until.read();
            let Some(deadline) = deadline else {
                return Ok(());
            };

            if deadline <= Instant::now() {
                let mut until = self.global_until.write();
                // Only clear if nobody pushed the deadline out meanwhile
                if (*until).is_some_and(|d| d <= Instant::now()) {
                    *until = None;
                }
                continue;
            }

            tokio::select! {
                () = self.shutdown.cancelled() => return Err(GatewayError::Canceled),
                () = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
}
