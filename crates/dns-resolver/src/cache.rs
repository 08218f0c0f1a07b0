use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dns_types::protocol::types::*;

/// Which records, other than the response itself, are cached when a
/// response is inserted.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HarvestPolicy {
    /// Only cache the response as the answer to its question.
    Exact,

    /// Also cache records whose owner is a subdomain of the question
    /// name, or of the zone the answering server was authoritative
    /// for.
    #[default]
    Extended,

    /// Also cache every record in the response, whatever its owner.
    ///
    /// This trusts the upstream completely: a server which is asked
    /// about `example.com` can insert records for any other domain.
    Full,
}

/// Counters for cache activity since it was created.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// A convenience wrapper around a `Cache` which lets it be shared
/// between threads.
///
/// Invoking `clone` on a `SharedCache` gives a new instance which
/// refers to the same underlying `Cache` object.
#[derive(Debug, Clone)]
pub struct SharedCache {
    cache: Arc<Mutex<Cache>>,
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

impl SharedCache {
    /// Make a new, empty, shared cache.
    pub fn new() -> Self {
        Self::from_cache(Cache::new())
    }

    /// Create a new cache holding at most `capacity` responses.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_cache(Cache::with_capacity(capacity))
    }

    /// Create a new cache with the given size and harvesting
    /// behaviour.
    pub fn with_policy(capacity: usize, harvest: HarvestPolicy, harvest_negative: bool) -> Self {
        Self::from_cache(Cache::with_policy(capacity, harvest, harvest_negative))
    }

    pub fn from_cache(cache: Cache) -> Self {
        SharedCache {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// Get a response from the cache.
    ///
    /// The TTLs in the returned `Message` are relative to the current
    /// time - not when the response was inserted into the cache.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn get(&self, question: &Question) -> Option<Message> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .get(question)
    }

    /// Insert a response into the cache, harvesting other records
    /// from it according to the policy.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn insert(&self, question: &Question, message: &Message) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert(question, message);
    }

    /// Like `insert`, but harvests with respect to the zone the
    /// answering server was queried as authoritative for.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn insert_in_zone(&self, question: &Question, message: &Message, zone: &DomainName) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert_in_zone(question, message, zone);
    }

    /// Harvest records from a response without caching the response
    /// itself.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn insert_harvest_only(&self, question: &Question, message: &Message, zone: &DomainName) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert_harvest_only(question, message, zone);
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn clear(&self) {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).clear();
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn len(&self) -> usize {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).len()
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).is_empty()
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn stats(&self) -> CacheStats {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).stats()
    }

    /// Atomically clears expired entries and, if the cache has grown
    /// beyond its capacity, prunes entries to get down to size.
    ///
    /// Returns `(has overflowed?, current size, num expired, num pruned)`.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn prune(&self) -> (bool, usize, usize, usize) {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).prune()
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Caching for responses, keyed by question.
///
/// You probably want to use `SharedCache` instead.
#[derive(Debug, Clone)]
pub struct Cache {
    /// Cached responses.
    entries: HashMap<Question, Entry>,

    /// Priority queue of questions ordered by access time.  The
    /// priority is a tick, not an `Instant`, as two accesses can
    /// happen within the resolution of the clock.
    ///
    /// INVARIANT: the keys in here are exactly the keys in `entries`.
    access_priority: PriorityQueue<Question, Reverse<u64>>,

    /// Priority queue of questions ordered by expiry time.
    ///
    /// INVARIANT: the keys in here are exactly the keys in `entries`.
    expiry_priority: PriorityQueue<Question, Reverse<Instant>>,

    /// Incremented on every use of an entry.
    tick: u64,

    /// The maximum number of entries.  Zero disables the cache.
    capacity: usize,

    harvest: HarvestPolicy,
    harvest_negative: bool,
    stats: CacheStats,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct Entry {
    message: Message,
    inserted: Instant,
    expires: Instant,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    /// Create a new cache with a default capacity and harvesting
    /// policy.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Create a new cache holding at most `capacity` responses.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_policy(capacity, HarvestPolicy::default(), false)
    }

    pub fn with_policy(capacity: usize, harvest: HarvestPolicy, harvest_negative: bool) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            access_priority: PriorityQueue::with_capacity(capacity),
            expiry_priority: PriorityQueue::with_capacity(capacity),
            tick: 0,
            capacity,
            harvest,
            harvest_negative,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, question: &Question) -> Option<Message> {
        self.get_at(question, Instant::now())
    }

    /// Get a response from the cache, promoting it to most recently
    /// used.  An expired response is removed and is a miss.
    pub fn get_at(&mut self, question: &Question, now: Instant) -> Option<Message> {
        let Some(entry) = self.entries.get(question) else {
            self.stats.misses += 1;
            return None;
        };

        if entry.expires <= now {
            self.remove(question);
            self.stats.misses += 1;
            self.stats.expirations += 1;
            return None;
        }

        let elapsed = now
            .saturating_duration_since(entry.inserted)
            .as_secs()
            .try_into()
            .unwrap_or(u32::MAX);
        let mut message = entry.message.clone();
        for rr in message
            .answers
            .iter_mut()
            .chain(message.authority.iter_mut())
            .chain(message.additional.iter_mut())
        {
            rr.ttl = rr.ttl.saturating_sub(elapsed);
        }

        self.touch(question);
        self.stats.hits += 1;
        Some(message)
    }

    /// Like `get_at`, but does not promote the entry or update the
    /// stats.
    fn contains_fresh(&self, question: &Question, now: Instant) -> bool {
        self.entries
            .get(question)
            .is_some_and(|entry| entry.expires > now)
    }

    pub fn insert(&mut self, question: &Question, message: &Message) {
        self.insert_at(question, message, Instant::now());
    }

    pub fn insert_at(&mut self, question: &Question, message: &Message, now: Instant) {
        self.insert_inner(question, message, None, true, now);
    }

    pub fn insert_in_zone(&mut self, question: &Question, message: &Message, zone: &DomainName) {
        self.insert_in_zone_at(question, message, zone, Instant::now());
    }

    pub fn insert_in_zone_at(
        &mut self,
        question: &Question,
        message: &Message,
        zone: &DomainName,
        now: Instant,
    ) {
        self.insert_inner(question, message, Some(zone), true, now);
    }

    pub fn insert_harvest_only(&mut self, question: &Question, message: &Message, zone: &DomainName) {
        self.insert_harvest_only_at(question, message, zone, Instant::now());
    }

    pub fn insert_harvest_only_at(
        &mut self,
        question: &Question,
        message: &Message,
        zone: &DomainName,
        now: Instant,
    ) {
        self.insert_inner(question, message, Some(zone), false, now);
    }

    fn insert_inner(
        &mut self,
        question: &Question,
        message: &Message,
        zone: Option<&DomainName>,
        include_exact: bool,
        now: Instant,
    ) {
        if self.capacity == 0 {
            return;
        }

        if is_negative(message) && !self.harvest_negative {
            return;
        }

        for (harvested_question, rrs) in self.harvest(question, message, zone) {
            if self.contains_fresh(&harvested_question, now) {
                continue;
            }

            let mut harvested = Message::from_question(0, harvested_question.clone()).make_response();
            harvested.header.recursion_available = false;
            harvested.answers = rrs;
            if let Some(ttl) = cacheable_ttl(&harvested) {
                self.store(harvested_question, harvested, ttl, now);
            }
        }

        // stored last so that eviction never picks it
        if include_exact {
            if let Some(ttl) = cacheable_ttl(message) {
                self.store(question.clone(), message.clone(), ttl, now);
            }
        }
    }

    /// Group the records of a response which the policy permits
    /// caching by the question they answer.
    fn harvest(
        &self,
        question: &Question,
        message: &Message,
        zone: Option<&DomainName>,
    ) -> Vec<(Question, Vec<ResourceRecord>)> {
        let is_relevant = |rr: &ResourceRecord| match self.harvest {
            HarvestPolicy::Exact => false,
            HarvestPolicy::Extended => {
                rr.name.is_subdomain_of(&question.name)
                    || zone.is_some_and(|z| rr.name.is_subdomain_of(z))
            }
            HarvestPolicy::Full => true,
        };

        let mut groups: Vec<(Question, Vec<ResourceRecord>)> = Vec::new();
        for rr in message
            .answers
            .iter()
            .chain(message.authority.iter())
            .chain(message.additional.iter())
        {
            if rr.ttl == 0 || !is_relevant(rr) {
                continue;
            }

            let implied = Question {
                name: rr.name.clone(),
                qtype: QueryType::Record(rr.rtype_with_data.rtype()),
                qclass: QueryClass::Record(rr.rclass),
            };
            if implied == *question {
                continue;
            }

            if let Some((_, rrs)) = groups.iter_mut().find(|(q, _)| *q == implied) {
                if !rrs.contains(rr) {
                    rrs.push(rr.clone());
                }
            } else {
                groups.push((implied, vec![rr.clone()]));
            }
        }

        groups
    }

    /// Insert or replace an entry, then evict until within capacity.
    fn store(&mut self, question: Question, message: Message, ttl: u32, now: Instant) {
        let expires = now + Duration::from_secs(ttl.into());
        let entry = Entry {
            message,
            inserted: now,
            expires,
        };

        self.tick += 1;
        if self.entries.insert(question.clone(), entry).is_some() {
            self.access_priority
                .change_priority(&question, Reverse(self.tick));
            self.expiry_priority
                .change_priority(&question, Reverse(expires));
        } else {
            self.access_priority.push(question.clone(), Reverse(self.tick));
            self.expiry_priority.push(question, Reverse(expires));
        }

        while self.entries.len() > self.capacity {
            if self.remove_least_recently_used() == 0 {
                break;
            }
        }
    }

    fn touch(&mut self, question: &Question) {
        self.tick += 1;
        self.access_priority
            .change_priority(question, Reverse(self.tick));
    }

    fn remove(&mut self, question: &Question) {
        self.entries.remove(question);
        self.access_priority.remove(question);
        self.expiry_priority.remove(question);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_priority.clear();
        self.expiry_priority.clear();
    }

    /// The number of entries, including expired ones which have not
    /// been removed yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn remove_expired(&mut self) -> usize {
        self.remove_expired_at(Instant::now())
    }

    /// Delete all expired entries.
    ///
    /// Returns the number of entries deleted.
    pub fn remove_expired_at(&mut self, now: Instant) -> usize {
        let mut pruned = 0;

        while let Some((_, Reverse(expiry))) = self.expiry_priority.peek() {
            if *expiry > now {
                break;
            }

            if let Some((question, _)) = self.expiry_priority.pop() {
                self.entries.remove(&question);
                self.access_priority.remove(&question);
                pruned += 1;
            }
        }

        self.stats.expirations += pruned as u64;
        pruned
    }

    pub fn prune(&mut self) -> (bool, usize, usize, usize) {
        self.prune_at(Instant::now())
    }

    /// Delete all expired entries, and then enough least-recently-used
    /// entries to reduce the cache to its capacity.
    ///
    /// Returns `(has overflowed?, current size, num expired, num pruned)`.
    pub fn prune_at(&mut self, now: Instant) -> (bool, usize, usize, usize) {
        let has_overflowed = self.entries.len() > self.capacity;
        let num_expired = self.remove_expired_at(now);
        let mut num_pruned = 0;

        while self.entries.len() > self.capacity {
            let pruned = self.remove_least_recently_used();
            if pruned == 0 {
                break;
            }
            num_pruned += pruned;
        }

        (has_overflowed, self.entries.len(), num_expired, num_pruned)
    }

    /// Returns the number of entries removed.
    fn remove_least_recently_used(&mut self) -> usize {
        if let Some((question, _)) = self.access_priority.pop() {
            self.expiry_priority.remove(&question);
            if self.entries.remove(&question).is_some() {
                self.stats.evictions += 1;
                return 1;
            }
        }

        0
    }
}

/// The TTL a response is cached for: the lowest TTL in the answer
/// section, or if there are no answers, the lowest TTL of the
/// authority and additional sections.
///
/// Returns `None` if there are no records or the TTL is zero.
pub fn cacheable_ttl(message: &Message) -> Option<u32> {
    let ttl = if message.answers.is_empty() {
        message
            .authority
            .iter()
            .chain(message.additional.iter())
            .map(|rr| rr.ttl)
            .min()
    } else {
        message.answers.iter().map(|rr| rr.ttl).min()
    }?;

    if ttl == 0 {
        None
    } else {
        Some(ttl)
    }
}

/// A response saying the name or the record does not exist.
pub fn is_negative(message: &Message) -> bool {
    if message.header.rcode == Rcode::NameError {
        return true;
    }

    message.answers.is_empty()
        && message
            .authority
            .iter()
            .any(|rr| rr.rtype_with_data.rtype() == RecordType::SOA)
}
