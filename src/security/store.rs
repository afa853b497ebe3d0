//! Shared rate limit state.
//!
//! A store holds one theoretical arrival time (TAT) per key and applies a
//! single GCRA step to it atomically. The Redis store does this with a Lua
//! script so that several proxy instances share one limit per key; the memory
//! store does it under the map's per-entry lock and is meant for tests and
//! single-instance development.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Parameters of one GCRA step, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcraParams {
    /// Nominal spacing between requests (`period / rate`).
    pub interval_us: u64,
    /// How far ahead of `now` the TAT may run (`burst * interval`).
    pub burst_offset_us: u64,
}

/// Result of one GCRA step as seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcraReply {
    pub allowed: bool,
    /// The key's TAT after this step (unchanged when denied).
    pub tat_us: u64,
    /// The store's clock at the time of the step.
    pub now_us: u64,
}

/// Failure talking to the store. Never means "denied".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed reply from rate limit store: {0}")]
    MalformedReply(String),
}

/// Atomic get-and-update of a per-key TAT with expiry.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Apply one GCRA step to `key`. Must be atomic with respect to every
    /// other caller using the same key, including other processes.
    async fn apply_gcra(&self, key: &str, params: GcraParams) -> Result<GcraReply, StoreError>;
}

/// Outcome of a GCRA step before it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GcraStep {
    pub reply: GcraReply,
    /// New TAT and its time-to-live, present only when admitted.
    pub write: Option<(u64, u64)>,
}

/// One GCRA step. `stored_tat` is `None` for absent or expired keys.
///
/// The Lua script in `redis_store.rs` implements exactly this function.
pub(crate) fn gcra_step(stored_tat: Option<u64>, now_us: u64, params: GcraParams) -> GcraStep {
    let tat = stored_tat.map_or(now_us, |t| t.max(now_us));
    let new_tat = tat.saturating_add(params.interval_us);

    // allow_at = new_tat - burst_offset; admitted when now >= allow_at
    if new_tat > now_us.saturating_add(params.burst_offset_us) {
        return GcraStep {
            reply: GcraReply {
                allowed: false,
                tat_us: tat,
                now_us,
            },
            write: None,
        };
    }

    let ttl_us = (new_tat - now_us).max(params.burst_offset_us);
    GcraStep {
        reply: GcraReply {
            allowed: true,
            tat_us: new_tat,
            now_us,
        },
        write: Some((new_tat, ttl_us)),
    }
}

/// Source of wall-clock time in microseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_us(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        Self {
            now_us: Arc::new(AtomicU64::new(start_us)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_us.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    tat_us: u64,
    expires_at_us: u64,
}

/// In-process store. Not shared between proxy instances.
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: DashMap::new(),
            clock,
        }
    }

    /// Number of keys currently held, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn apply_gcra(&self, key: &str, params: GcraParams) -> Result<GcraReply, StoreError> {
        let now_us = self.clock.now_us();

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.slots.entry(key.to_string()).or_insert(Slot {
            tat_us: now_us,
            expires_at_us: 0,
        });
        let stored = (entry.expires_at_us > now_us).then_some(entry.tat_us);

        let step = gcra_step(stored, now_us, params);
        if let Some((tat_us, ttl_us)) = step.write {
            *entry = Slot {
                tat_us,
                expires_at_us: now_us.saturating_add(ttl_us),
            };
        }

        Ok(step.reply)
    }
}
