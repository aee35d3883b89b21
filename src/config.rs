//! # Relay configuration.
//!
//! Provides [`RelayConfig`], the settings passed to [`EventRelay::new`](crate::EventRelay::new).
//!
//! ## Sentinel values
//! - `max_pending = 0` → unbounded pending buffer
//! - `completion_ttl = 0s` → completion entries never expire (no sweeper)

use std::time::Duration;

use crate::relay::IdScheme;

/// Configuration for the event relay.
///
/// ## Field semantics
/// - `id_scheme`: how correlation ids are minted (`Wide` by default)
/// - `max_pending`: pending buffer capacity across all topics (`0` = unbounded)
/// - `completion_ttl`: age after which an unacknowledged completion is evicted (`0s` = never)
/// - `sweep_interval`: how often [`EventRelay::spawn_sweeper`](crate::EventRelay::spawn_sweeper) checks for stale entries
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Correlation id format.
    pub id_scheme: IdScheme,

    /// Maximum number of buffered events across all topics.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = `emit` on a non-ready topic fails with
    ///   [`RelayError::BufferFull`](crate::RelayError::BufferFull) once `n` events are waiting
    pub max_pending: usize,

    /// Maximum time a delivered event may stay unacknowledged.
    ///
    /// - `Duration::ZERO` = no eviction; an unacknowledged entry lives for the
    ///   life of the process
    /// - `> 0` = stale entries are evicted (completion dropped, not run) and a
    ///   late acknowledgment returns `NotFound`
    pub completion_ttl: Duration,

    /// Period of the eviction sweeper. Ignored when `completion_ttl` is zero.
    pub sweep_interval: Duration,
}

impl RelayConfig {
    /// Returns the pending buffer capacity as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` buffered events
    #[inline]
    pub fn pending_limit(&self) -> Option<usize> {
        if self.max_pending == 0 {
            None
        } else {
            Some(self.max_pending)
        }
    }

    /// Returns the completion TTL as an `Option`.
    ///
    /// - `None` → entries never expire
    /// - `Some(d)` → entries older than `d` are evicted
    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        if self.completion_ttl == Duration::ZERO {
            None
        } else {
            Some(self.completion_ttl)
        }
    }

    /// Returns the sweep interval clamped to a minimum of 1ms.
    ///
    /// `tokio::time::interval` panics on a zero period.
    #[inline]
    pub fn sweep_interval_clamped(&self) -> Duration {
        self.sweep_interval.max(Duration::from_millis(1))
    }
}

impl Default for RelayConfig {
    /// Default configuration:
    ///
    /// - `id_scheme = IdScheme::Wide`
    /// - `max_pending = 0` (unbounded)
    /// - `completion_ttl = 0s` (no eviction)
    /// - `sweep_interval = 30s`
    fn default() -> Self {
        Self {
            id_scheme: IdScheme::default(),
            max_pending: 0,
            completion_ttl: Duration::ZERO,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_limits() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.pending_limit(), None);
        assert_eq!(cfg.ttl(), None);
        assert_eq!(cfg.id_scheme, IdScheme::Wide);
    }

    #[test]
    fn sentinels_map_to_options() {
        let cfg = RelayConfig {
            max_pending: 8,
            completion_ttl: Duration::from_secs(25),
            sweep_interval: Duration::ZERO,
            ..RelayConfig::default()
        };
        assert_eq!(cfg.pending_limit(), Some(8));
        assert_eq!(cfg.ttl(), Some(Duration::from_secs(25)));
        assert_eq!(cfg.sweep_interval_clamped(), Duration::from_millis(1));
    }
}
