//! Process-wide admission control.
//!
//! A single token bucket sits in front of every route: capacity `burst`,
//! refilled continuously at `requests_per_second`. Acquisition never waits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use parking_lot::Mutex;

use crate::error::AppError;
use crate::metrics::{REQUEST_ADMITTED, REQUEST_REJECTED};
use crate::storage::CredentialStore;
use crate::AppState;

/// Default sustained rate
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 2.0;

/// Default bucket capacity
pub const DEFAULT_BURST: u32 = 4;

#[derive(Debug)]
struct Bucket {
    /// Available tokens, scaled by 1000 for sub-token precision
    tokens_millis: u64,
    last_refill: Instant,
}

/// Token bucket shared by all requests of one server
#[derive(Debug)]
pub struct AdmissionLimiter {
    bucket: Mutex<Bucket>,
    capacity_millis: u64,
    refill_rate: f64,
    rejected: AtomicU64,
}

impl AdmissionLimiter {
    /// A limiter starting with a full bucket
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self::starting_at(requests_per_second, burst, Instant::now())
    }

    /// A limiter whose refill clock starts at `start`
    pub fn starting_at(requests_per_second: f64, burst: u32, start: Instant) -> Self {
        let capacity_millis = u64::from(burst) * 1000;
        Self {
            bucket: Mutex::new(Bucket {
                tokens_millis: capacity_millis,
                last_refill: start,
            }),
            capacity_millis,
            refill_rate: requests_per_second,
            rejected: AtomicU64::new(0),
        }
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Take one token, refilling up to `now` first
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock();

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = (elapsed.as_secs_f64() * self.refill_rate * 1000.0) as u64;
        if refill > 0 {
            let filled = bucket.tokens_millis.saturating_add(refill);
            if filled >= self.capacity_millis {
                bucket.tokens_millis = self.capacity_millis;
                bucket.last_refill = now;
            } else {
                // Advance only by the time actually credited; the remainder
                // carries into the next refill.
                bucket.tokens_millis = filled;
                bucket.last_refill +=
                    Duration::from_secs_f64(refill as f64 / (self.refill_rate * 1000.0));
            }
        }

        if bucket.tokens_millis >= 1000 {
            bucket.tokens_millis -= 1000;
            true
        } else {
            drop(bucket);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Requests rejected since construction
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Admission middleware; runs before any identity work
pub async fn admission<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.limiter.try_acquire() {
        counter!(REQUEST_REJECTED).increment(1);
        return Err(AppError::AdmissionRejected);
    }
    counter!(REQUEST_ADMITTED).increment(1);

    Ok(next.run(request).await)
}
