//! Deadline store: every tracked service plus a min-heap of check deadlines.
//!
//! Services live in a map keyed by id. The heap holds ids ordered by
//! `last_check`, and each map slot records the id's current heap position so
//! an arbitrary id can be removed or repositioned in O(log n) without
//! scanning or comparing records for equality.
//!
//! A service popped for probing stays in the map but leaves the heap until
//! [`DeadlineStore::update`] puts it back. While it is out, no tick can pop
//! it again.

use crate::types::{Service, ServiceId, ServiceList, Status};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

struct Slot {
    service: Service,
    /// Insertion sequence. Orders snapshots and breaks deadline ties.
    seq: u64,
    /// Position in `heap`, `None` while a probe is in flight.
    heap_pos: Option<usize>,
}

/// Map of services plus an index-tracking binary heap of deadlines
pub struct DeadlineStore {
    slots: HashMap<ServiceId, Slot>,
    heap: Vec<ServiceId>,
    poll_interval: TimeDelta,
    next_seq: u64,
}

impl DeadlineStore {
    /// Create an empty store. A service becomes due `poll_interval` after
    /// its last check.
    ///
    /// Last checks are recorded at minute resolution, so the interval is
    /// rounded up to a whole number of minutes (at least one). A shorter
    /// interval would make a freshly checked service due again at once.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            heap: Vec::new(),
            poll_interval: whole_minutes(poll_interval),
            next_seq: 0,
        }
    }

    /// Effective interval between checks of one service
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval.to_std().unwrap_or(Duration::MAX)
    }

    /// Number of tracked services, including those with a probe in flight
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of services popped for probing whose result is not back yet
    pub fn in_flight(&self) -> usize {
        self.slots.len() - self.heap.len()
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.slots.get(id).map(|slot| &slot.service)
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.slots.get(id).is_some_and(|slot| slot.heap_pos.is_none())
    }

    /// Track a new service and return its freshly allocated id.
    ///
    /// The service starts as `UNKNOWN` with a `last_check` at the epoch, so
    /// it is due on the next tick.
    pub fn add(&mut self, name: impl Into<String>, url: impl Into<String>) -> ServiceId {
        let id = Uuid::new_v4().to_string();
        self.insert(Service::new(id.clone(), name, url));
        id
    }

    /// Track an existing service record, keeping its status and last check.
    /// A record with an id that is already tracked replaces the old one.
    pub fn insert(&mut self, service: Service) {
        self.remove(&service.id);

        let id = service.id.clone();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.slots.insert(
            id.clone(),
            Slot {
                service,
                seq,
                heap_pos: None,
            },
        );
        self.push(id);
    }

    /// Stop tracking a service. Returns whether it was tracked.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };

        if let Some(pos) = slot.heap_pos {
            self.remove_at(pos);
        }
        true
    }

    /// Whether the earliest deadline in the heap has passed at `now`.
    pub fn peek_due(&self, now: DateTime<Utc>) -> bool {
        self.heap
            .first()
            .is_some_and(|id| self.is_due(&self.slots[id].service, now))
    }

    /// Remove the most overdue service from the heap and return a copy of it.
    ///
    /// Returns `None` when nothing is due. The service stays tracked and is
    /// rescheduled by [`update`](Self::update).
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Service> {
        if !self.peek_due(now) {
            return None;
        }

        let id = self.remove_at(0);
        self.slots.get(&id).map(|slot| slot.service.clone())
    }

    /// Record a probe result and reschedule the service.
    ///
    /// Returns `false` without doing anything when the id is not tracked,
    /// which happens when the service was removed while its probe was in
    /// flight. A removed service is never brought back.
    pub fn update(&mut self, id: &str, status: Status, last_check: DateTime<Utc>) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };

        slot.service.status = status;
        slot.service.last_check = last_check;
        let heap_pos = slot.heap_pos;

        if let Some(pos) = heap_pos {
            self.remove_at(pos);
        }
        self.push(id.to_string());
        true
    }

    /// All tracked services in insertion order.
    pub fn snapshot(&self) -> Vec<Service> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.service.clone()).collect()
    }

    /// Export every tracked service for persistence.
    pub fn dump(&self) -> ServiceList {
        ServiceList {
            services: self.snapshot(),
        }
    }

    /// Import services as if newly tracked, keeping their stored status and
    /// last check. Returns the number of services loaded.
    pub fn load(&mut self, services: impl IntoIterator<Item = Service>) -> usize {
        let mut count = 0;
        for service in services {
            self.insert(service);
            count += 1;
        }
        count
    }

    fn is_due(&self, service: &Service, now: DateTime<Utc>) -> bool {
        service
            .last_check
            .checked_add_signed(self.poll_interval)
            .is_some_and(|deadline| deadline < now)
    }

    fn key(&self, pos: usize) -> (DateTime<Utc>, u64) {
        let slot = &self.slots[&self.heap[pos]];
        (slot.service.last_check, slot.seq)
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.key(a) < self.key(b)
    }

    fn set_pos(&mut self, pos: usize) {
        if let Some(slot) = self.slots.get_mut(&self.heap[pos]) {
            slot.heap_pos = Some(pos);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.set_pos(a);
        self.set_pos(b);
    }

    fn push(&mut self, id: ServiceId) {
        self.heap.push(id);
        let pos = self.heap.len() - 1;
        self.set_pos(pos);
        self.sift_up(pos);
    }

    /// Take the id at `pos` out of the heap and restore heap order.
    fn remove_at(&mut self, pos: usize) -> ServiceId {
        let removed = self.heap.swap_remove(pos);
        if let Some(slot) = self.slots.get_mut(&removed) {
            slot.heap_pos = None;
        }

        if pos < self.heap.len() {
            self.set_pos(pos);
            self.sift_down(pos);
            self.sift_up(pos);
        }
        removed
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    /// Verify map/heap consistency and heap order.
    #[cfg(test)]
    fn check_invariants(&self) -> Result<(), String> {
        for (pos, id) in self.heap.iter().enumerate() {
            let slot = self
                .slots
                .get(id)
                .ok_or_else(|| format!("heap entry {id} has no slot"))?;
            if slot.heap_pos != Some(pos) {
                return Err(format!("{id} is at {pos} but slot says {:?}", slot.heap_pos));
            }
            if pos > 0 && self.less(pos, (pos - 1) / 2) {
                return Err(format!("heap order violated at {pos}"));
            }
        }

        let scheduled = self.slots.values().filter(|s| s.heap_pos.is_some()).count();
        if scheduled != self.heap.len() {
            return Err(format!(
                "{scheduled} slots claim a heap position, heap holds {}",
                self.heap.len()
            ));
        }
        Ok(())
    }
}

fn whole_minutes(interval: Duration) -> TimeDelta {
    let minutes = interval.as_secs().div_ceil(60).max(1);
    i64::try_from(minutes)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .unwrap_or(TimeDelta::MAX)
}

/// Shared handle to a [`DeadlineStore`].
///
/// All access is serialized through one lock. The lock is only held for the
/// duration of a store operation, never across a probe.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<DeadlineStore>>,
}

impl StoreHandle {
    pub fn new(store: DeadlineStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn add(&self, name: impl Into<String>, url: impl Into<String>) -> ServiceId {
        self.inner.lock().await.add(name, url)
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.inner.lock().await.remove(id)
    }

    pub async fn update(&self, id: &str, status: Status, last_check: DateTime<Utc>) -> bool {
        self.inner.lock().await.update(id, status, last_check)
    }

    /// Pop every service that is due at `now`, most overdue first.
    pub async fn pop_all_due(&self, now: DateTime<Utc>) -> Vec<Service> {
        let mut store = self.inner.lock().await;
        let mut due = Vec::new();
        while store.peek_due(now) {
            match store.pop_due(now) {
                Some(service) => due.push(service),
                None => break,
            }
        }
        due
    }

    pub async fn get(&self, id: &str) -> Option<Service> {
        self.inner.lock().await.get(id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<Service> {
        self.inner.lock().await.snapshot()
    }

    pub async fn dump(&self) -> ServiceList {
        self.inner.lock().await.dump()
    }

    pub async fn load(&self, services: Vec<Service>) -> usize {
        self.inner.lock().await.load(services)
    }

    /// Tracked and in-flight counts, read under one lock.
    pub async fn counts(&self) -> (usize, usize) {
        let store = self.inner.lock().await;
        (store.len(), store.in_flight())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
