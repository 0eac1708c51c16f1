//! Sliding-window bookkeeping shared by the request and click logs

use dashmap::DashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Ordered event timestamps for one key
pub type EventLog = VecDeque<Instant>;

/// Drop every timestamp older than `window` relative to `now`.
///
/// An entry exactly `window` old is kept. Timestamps later than `now`
/// (recorded by a concurrent request) are kept as well.
pub fn prune(log: &mut EventLog, now: Instant, window: Duration) {
    log.retain(|&t| now.saturating_duration_since(t) <= window);
}

/// Prune, then record `now`. Returns the number of events now in the window.
pub fn record(log: &mut EventLog, now: Instant, window: Duration) -> u32 {
    prune(log, now, window);
    log.push_back(now);
    u32::try_from(log.len()).unwrap_or(u32::MAX)
}

/// Seconds until the oldest retained event leaves the window
pub fn reset_in_secs(log: &EventLog, now: Instant, window: Duration) -> u64 {
    log.front()
        .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
        .unwrap_or(window)
        .as_secs()
}

/// Evict the least recently active key when `map` is full and `key` is new.
///
/// `last_active` returning `None` pins an entry: it is never evicted, and a
/// map holding only pinned entries grows past `capacity`. `capacity == 0`
/// disables the cap. The cap is soft: concurrent inserts of distinct new keys
/// may overshoot it by the number of racing writers.
pub fn make_room<K, V>(
    map: &DashMap<K, V>,
    key: &K,
    capacity: usize,
    last_active: impl Fn(&V) -> Option<Instant>,
) -> Option<K>
where
    K: Eq + Hash + Clone,
{
    if capacity == 0 || map.len() < capacity || map.contains_key(key) {
        return None;
    }

    let victim = map
        .iter()
        .filter_map(|entry| last_active(entry.value()).map(|t| (t, entry.key().clone())))
        .min_by_key(|(t, _)| *t)
        .map(|(_, key)| key)?;

    map.remove(&victim);
    Some(victim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_only_recent() {
        let t0 = Instant::now();
        let window = Duration::from_secs(60);
        let mut log: EventLog = [0, 10, 20, 100].iter().map(|s| t0 + Duration::from_secs(*s)).collect();

        // At t=130 only t=100 is inside the window
        let count = record(&mut log, t0 + Duration::from_secs(130), window);
        assert_eq!(count, 2);
        assert_eq!(log.front().copied(), Some(t0 + Duration::from_secs(100)));

        // Everything but the most recent entry falls out
        let mut log: EventLog = [0, 1, 2].iter().map(|s| t0 + Duration::from_secs(*s)).collect();
        prune(&mut log, t0 + Duration::from_secs(62), window);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_prune_boundary_is_inclusive() {
        let t0 = Instant::now();
        let window = Duration::from_secs(60);
        let mut log: EventLog = VecDeque::from([t0]);

        prune(&mut log, t0 + window, window);
        assert_eq!(log.len(), 1);

        prune(&mut log, t0 + window + Duration::from_millis(1), window);
        assert!(log.is_empty());
    }

    #[test]
    fn test_reset_in_secs() {
        let t0 = Instant::now();
        let window = Duration::from_secs(60);
        let log: EventLog = VecDeque::from([t0]);
        assert_eq!(reset_in_secs(&log, t0 + Duration::from_secs(20), window), 40);
        assert_eq!(reset_in_secs(&EventLog::new(), t0, window), 60);
    }

    #[test]
    fn test_make_room_evicts_stalest() {
        let t0 = Instant::now();
        let map: DashMap<&str, Instant> = DashMap::new();
        map.insert("old", t0);
        map.insert("new", t0 + Duration::from_secs(5));

        // Existing key never evicts
        assert_eq!(make_room(&map, &"new", 2, |t| Some(*t)), None);

        // New key into a full map evicts the oldest
        assert_eq!(make_room(&map, &"third", 2, |t| Some(*t)), Some("old"));
        assert!(!map.contains_key("old"));

        // Zero capacity means uncapped
        map.insert("old", t0);
        assert_eq!(make_room(&map, &"fourth", 0, |t| Some(*t)), None);
    }

    #[test]
    fn test_make_room_skips_pinned() {
        let t0 = Instant::now();
        let map: DashMap<&str, Instant> = DashMap::new();
        map.insert("pinned", t0);
        map.insert("idle", t0 + Duration::from_secs(5));
        let keep = |t: &Instant| (*t != t0).then_some(*t);

        assert_eq!(make_room(&map, &"third", 2, keep), Some("idle"));
        assert!(map.contains_key("pinned"));

        // Only pinned entries left: nothing to evict
        map.insert("third", t0);
        assert_eq!(make_room(&map, &"fourth", 2, keep), None);
        assert_eq!(map.len(), 2);
    }
}
