//! Registry of clients flagged as fraudulent
//!
//! Without a TTL a flag lasts for the lifetime of the process. With one,
//! flags expire lazily on lookup and in periodic cleanup.

use super::window;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use leadgate_common::{ClientKey, FlagReason, SuspectInfo};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SuspicionRecord {
    pub reason: FlagReason,
    pub flagged_at: Instant,
    pub flagged_at_utc: DateTime<Utc>,
}

pub struct SuspicionRegistry {
    entries: DashMap<ClientKey, SuspicionRecord>,
    ttl: Option<Duration>,
    capacity: usize,
}

impl SuspicionRegistry {
    pub fn new(ttl: Option<Duration>, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
        }
    }

    fn expired(&self, record: &SuspicionRecord, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.saturating_duration_since(record.flagged_at) > ttl)
            .unwrap_or(false)
    }

    /// Flag `client`. Returns `true` if it was not already suspicious.
    ///
    /// An existing live flag keeps its original reason. Only expired flags
    /// are evicted to stay under capacity.
    pub fn flag(&self, client: &ClientKey, reason: FlagReason, now: Instant) -> bool {
        window::make_room(&self.entries, client, self.capacity, |r| {
            self.expired(r, now).then_some(r.flagged_at)
        });

        let record = SuspicionRecord {
            reason,
            flagged_at: now,
            flagged_at_utc: Utc::now(),
        };

        match self.entries.entry(client.clone()) {
            Entry::Occupied(mut existing) => {
                if self.expired(existing.get(), now) {
                    existing.insert(record);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub fn is_suspicious(&self, client: &ClientKey, now: Instant) -> bool {
        let expired = match self.entries.get(client) {
            Some(record) => self.expired(record.value(), now),
            None => return false,
        };

        if expired {
            if self
                .entries
                .remove_if(client, |_, record| self.expired(record, now))
                .is_some()
            {
                tracing::info!(client = %client, "Suspicion flag expired");
            }
            return false;
        }
        true
    }

    /// Remove a flag. Returns `true` if the client was flagged.
    pub fn unflag(&self, client: &ClientKey) -> bool {
        self.entries.remove(client).is_some()
    }

    /// Snapshot of all flags, oldest first
    pub fn list(&self) -> Vec<SuspectInfo> {
        let mut records: Vec<(Instant, SuspectInfo)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.flagged_at,
                    SuspectInfo {
                        client: entry.key().clone(),
                        reason: entry.reason.clone(),
                        flagged_at: entry.flagged_at_utc,
                    },
                )
            })
            .collect();
        records.sort_by_key(|(at, _)| *at);
        records.into_iter().map(|(_, info)| info).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop expired flags (no-op without a TTL)
    pub fn cleanup(&self, now: Instant) {
        if self.ttl.is_some() {
            self.entries.retain(|_, record| !self.expired(record, now));
        }
    }
}
