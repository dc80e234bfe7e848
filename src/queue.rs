//! Pending-request bookkeeping and dispatch ordering.
//!
//! `RequestQueue` combines the keyed pending set (one entry per key, newest
//! wins) with two FIFO tiers: priority requests are dispatched before normal
//! ones, and within a tier by arrival ticket. Tier entries are `(ticket, key)`
//! pairs; an entry whose ticket no longer matches the pending request for its
//! key was superseded or cancelled and is dropped lazily when reached.
//!
//! The queue also tracks in-flight keys so a key is never dispatched twice at
//! the same time: a pending request whose key is in flight is skipped until
//! `finish()` is called for the running one.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use crate::request::LoadRequest;

/// Dead tier entries tolerated before a compaction pass.
const COMPACT_SLACK: usize = 64;

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    cancelled: bool,
}

pub(crate) struct RequestQueue<K> {
    pending: HashMap<K, LoadRequest<K>>,
    high: VecDeque<(u64, K)>,
    normal: VecDeque<(u64, K)>,
    in_flight: HashMap<K, InFlight>,
    next_ticket: u64,
}

impl<K: Eq + Hash + Clone> RequestQueue<K> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            high: VecDeque::new(),
            normal: VecDeque::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Queue a request, assigning its arrival ticket.
    ///
    /// Returns the request it superseded, if the key was already pending.
    /// The new request takes its own tier and arrival slot.
    pub fn push(&mut self, mut request: LoadRequest<K>) -> Option<LoadRequest<K>> {
        self.next_ticket += 1;
        request.ticket = self.next_ticket;

        let entry = (request.ticket, request.key.clone());
        if request.priority {
            self.high.push_back(entry);
        } else {
            self.normal.push_back(entry);
        }

        let superseded = self.pending.insert(request.key.clone(), request);
        if superseded.is_some() {
            self.compact_if_needed();
        }
        superseded
    }

    /// Claim the next dispatchable request and mark its key in flight.
    pub fn pop_next(&mut self) -> Option<LoadRequest<K>> {
        let request = Self::pop_tier(&mut self.high, &mut self.pending, &self.in_flight)
            .or_else(|| Self::pop_tier(&mut self.normal, &mut self.pending, &self.in_flight))?;

        self.in_flight.insert(
            request.key.clone(),
            InFlight {
                ticket: request.ticket,
                cancelled: false,
            },
        );
        Some(request)
    }

    fn pop_tier(
        tier: &mut VecDeque<(u64, K)>,
        pending: &mut HashMap<K, LoadRequest<K>>,
        in_flight: &HashMap<K, InFlight>,
    ) -> Option<LoadRequest<K>> {
        let mut index = 0;
        while index < tier.len() {
            let (live, blocked) = {
                let (ticket, key) = &tier[index];
                (
                    pending.get(key).is_some_and(|r| r.ticket == *ticket),
                    in_flight.contains_key(key),
                )
            };

            if !live {
                tier.remove(index);
                continue;
            }
            if blocked {
                index += 1;
                continue;
            }

            let (_, key) = tier.remove(index)?;
            return pending.remove(&key);
        }
        None
    }

    /// Clear the in-flight marker for a finished request.
    ///
    /// Returns whether the result is stale: the request was cancelled while
    /// running, or a newer request for the same key is pending.
    pub fn finish(&mut self, key: &K, ticket: u64) -> bool {
        let cancelled = match self.in_flight.get(key) {
            Some(flight) if flight.ticket == ticket => {
                let cancelled = flight.cancelled;
                self.in_flight.remove(key);
                cancelled
            }
            _ => false,
        };
        cancelled || self.pending.contains_key(key)
    }

    /// Drop the pending request for `key`. In-flight work is untouched.
    pub fn remove(&mut self, key: &K) -> bool {
        let removed = self.pending.remove(key).is_some();
        if removed {
            self.compact_if_needed();
        }
        removed
    }

    /// Drop every pending request, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.high.clear();
        self.normal.clear();
        dropped
    }

    /// Flag the in-flight request for `key` so its result is reported stale.
    pub fn mark_stale(&mut self, key: &K) -> bool {
        match self.in_flight.get_mut(key) {
            Some(flight) => {
                flight.cancelled = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_stale(&mut self) {
        for flight in self.in_flight.values_mut() {
            flight.cancelled = true;
        }
    }

    pub fn get(&self, key: &K) -> Option<&LoadRequest<K>> {
        self.pending.get(key)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether any pending request could be dispatched right now.
    #[cfg(test)]
    fn has_dispatchable(&self) -> bool {
        self.pending.keys().any(|k| !self.in_flight.contains_key(k))
    }

    /// Tier entries including dead ones awaiting removal.
    #[cfg(test)]
    fn tier_len(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    fn compact_if_needed(&mut self) {
        let live = self.pending.len();
        if self.high.len() + self.normal.len() <= live * 2 + COMPACT_SLACK {
            return;
        }
        let pending = &self.pending;
        let is_live = |(ticket, key): &(u64, K)| pending.get(key).is_some_and(|r| r.ticket == *ticket);
        self.high.retain(is_live);
        self.normal.retain(is_live);
    }
}

impl<K: Eq + Hash + Clone> Default for RequestQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
