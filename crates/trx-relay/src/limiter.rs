//! Per-radio rate limiting with deferred flush
//!
//! Each radio may be forwarded at most once per minimum interval. Updates
//! arriving inside the interval are not queued: only the most recent one is
//! kept as the radio's pending update, and it is flushed once the interval
//! has elapsed so the last known state is delayed, never lost.
//!
//! The limiter takes the current time as an argument instead of reading a
//! clock, so callers (and tests) decide what "now" is.

use std::collections::BTreeMap;

use tokio::time::{Duration, Instant};
use trx_protocol::RadioId;

/// Result of offering an update to the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Send now, then call [`RateLimiter::record_forwarded`]
    Forward,
    /// Too soon; keep the update with [`RateLimiter::store_pending`]
    Suppress,
}

#[derive(Debug)]
struct RadioSlot<T> {
    last_forwarded: Option<Instant>,
    pending: Option<T>,
}

impl<T> Default for RadioSlot<T> {
    fn default() -> Self {
        Self {
            last_forwarded: None,
            pending: None,
        }
    }
}

/// Rate limiter keyed by radio
///
/// Generic over the pending payload so the relay can keep translated
/// messages while tests can use plain values.
#[derive(Debug)]
pub struct RateLimiter<T> {
    min_interval: Duration,
    radios: BTreeMap<RadioId, RadioSlot<T>>,
}

impl<T> RateLimiter<T> {
    /// Create a limiter allowing one forward per radio per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            radios: BTreeMap::new(),
        }
    }

    /// Decide whether an update for `radio` may be forwarded at `now`
    ///
    /// Never mutates state; a radio that was never forwarded is always
    /// admitted.
    pub fn admit(&self, radio: &RadioId, now: Instant) -> Decision {
        let last = self.radios.get(radio).and_then(|slot| slot.last_forwarded);
        if self.interval_elapsed(last, now) {
            Decision::Forward
        } else {
            Decision::Suppress
        }
    }

    /// Record that an update for `radio` was forwarded at `now`
    ///
    /// The forward time never moves backwards. Any pending update is
    /// discarded since the forwarded one supersedes it.
    pub fn record_forwarded(&mut self, radio: &RadioId, now: Instant) {
        let slot = self.radios.entry(radio.clone()).or_default();
        slot.last_forwarded = Some(match slot.last_forwarded {
            Some(last) if last > now => last,
            _ => now,
        });
        slot.pending = None;
    }

    /// Keep `update` as the pending update for `radio`
    ///
    /// Returns the update it replaced, if any.
    pub fn store_pending(&mut self, radio: &RadioId, update: T) -> Option<T> {
        self.radios
            .entry(radio.clone())
            .or_default()
            .pending
            .replace(update)
    }

    /// Radios holding a pending update whose interval has elapsed, in radio
    /// order
    ///
    /// This is the one-shot override: the caller sends each radio's
    /// [`pending`](Self::pending) update and then calls
    /// [`record_forwarded`](Self::record_forwarded), which clears it. A send
    /// that fails leaves the update pending for the next opportunity.
    pub fn due(&self, now: Instant) -> Vec<RadioId> {
        self.radios
            .iter()
            .filter(|(_, slot)| {
                slot.pending.is_some() && self.interval_elapsed(slot.last_forwarded, now)
            })
            .map(|(radio, _)| radio.clone())
            .collect()
    }

    /// When `radio` was last forwarded
    pub fn last_forwarded(&self, radio: &RadioId) -> Option<Instant> {
        self.radios.get(radio).and_then(|slot| slot.last_forwarded)
    }

    /// The pending update for `radio`, if any
    pub fn pending(&self, radio: &RadioId) -> Option<&T> {
        self.radios.get(radio).and_then(|slot| slot.pending.as_ref())
    }

    /// Number of radios with a pending update
    pub fn pending_count(&self) -> usize {
        self.radios
            .values()
            .filter(|slot| slot.pending.is_some())
            .count()
    }

    fn interval_elapsed(&self, last: Option<Instant>, now: Instant) -> bool {
        match last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(500);

    fn ft817() -> RadioId {
        RadioId::new("ft817")
    }

    #[test]
    fn test_first_update_forwards() {
        let limiter: RateLimiter<&str> = RateLimiter::new(INTERVAL);
        assert_eq!(limiter.admit(&ft817(), Instant::now()), Decision::Forward);
    }

    #[test]
    fn test_update_inside_interval_suppressed() {
        let mut limiter = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        limiter.record_forwarded(&ft817(), t0);

        let t1 = t0 + Duration::from_millis(200);
        assert_eq!(limiter.admit(&ft817(), t1), Decision::Suppress);
        assert_eq!(limiter.store_pending(&ft817(), "LSB"), None);
        assert_eq!(limiter.pending(&ft817()), Some(&"LSB"));
    }

    #[test]
    fn test_pending_is_overwritten_not_queued() {
        let mut limiter = RateLimiter::new(INTERVAL);
        limiter.record_forwarded(&ft817(), Instant::now());

        limiter.store_pending(&ft817(), "LSB");
        assert_eq!(limiter.store_pending(&ft817(), "CW"), Some("LSB"));
        assert_eq!(limiter.pending(&ft817()), Some(&"CW"));
        assert_eq!(limiter.pending_count(), 1);
    }

    #[test]
    fn test_update_after_interval_forwards() {
        let mut limiter: RateLimiter<&str> = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        limiter.record_forwarded(&ft817(), t0);
        assert_eq!(limiter.admit(&ft817(), t0 + INTERVAL), Decision::Forward);
    }

    #[test]
    fn test_radios_are_limited_independently() {
        let mut limiter: RateLimiter<&str> = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        limiter.record_forwarded(&ft817(), t0);
        assert_eq!(
            limiter.admit(&RadioId::new("ic7300"), t0 + Duration::from_millis(1)),
            Decision::Forward
        );
    }

    #[test]
    fn test_due_waits_for_interval() {
        let mut limiter = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        limiter.record_forwarded(&ft817(), t0);
        limiter.store_pending(&ft817(), "LSB");

        assert!(limiter.due(t0 + Duration::from_millis(300)).is_empty());

        let t1 = t0 + Duration::from_millis(600);
        assert_eq!(limiter.due(t1), vec![ft817()]);
        // Listing due radios takes nothing
        assert_eq!(limiter.pending(&ft817()), Some(&"LSB"));

        limiter.record_forwarded(&ft817(), t1);
        assert_eq!(limiter.last_forwarded(&ft817()), Some(t1));
        assert!(limiter.due(t1).is_empty());
    }

    #[test]
    fn test_forward_discards_stale_pending() {
        let mut limiter = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        limiter.record_forwarded(&ft817(), t0);
        limiter.store_pending(&ft817(), "LSB");

        limiter.record_forwarded(&ft817(), t0 + INTERVAL);
        assert_eq!(limiter.pending(&ft817()), None);
    }

    #[test]
    fn test_last_forwarded_never_moves_backwards() {
        let mut limiter: RateLimiter<&str> = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(3);
        limiter.record_forwarded(&ft817(), later);
        limiter.record_forwarded(&ft817(), t0);
        assert_eq!(limiter.last_forwarded(&ft817()), Some(later));
    }

    #[test]
    fn test_due_only_lists_elapsed_radios() {
        let mut limiter = RateLimiter::new(INTERVAL);
        let t0 = Instant::now();
        let ic7300 = RadioId::new("ic7300");

        limiter.record_forwarded(&ft817(), t0);
        limiter.record_forwarded(&ic7300, t0 + Duration::from_millis(300));
        limiter.store_pending(&ft817(), "ft817 LSB");
        limiter.store_pending(&ic7300, "ic7300 CW");

        assert_eq!(limiter.due(t0 + Duration::from_millis(600)), vec![ft817()]);
        assert_eq!(
            limiter.due(t0 + Duration::from_millis(800)),
            vec![ft817(), ic7300]
        );
    }

    #[test]
    fn test_flush_with_earlier_clock_keeps_forward_time() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(1);
        limiter.record_forwarded(&ft817(), later);
        limiter.store_pending(&ft817(), "LSB");

        // With no interval an earlier reading is still due
        assert_eq!(limiter.due(t0), vec![ft817()]);
        limiter.record_forwarded(&ft817(), t0);
        assert_eq!(limiter.last_forwarded(&ft817()), Some(later));
        assert_eq!(limiter.pending(&ft817()), None);
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let mut limiter: RateLimiter<&str> = RateLimiter::new(Duration::ZERO);
        let t0 = Instant::now();
        limiter.record_forwarded(&ft817(), t0);
        assert_eq!(limiter.admit(&ft817(), t0), Decision::Forward);
    }
}
