/// Metrics from a resolution attempt.  The resolvers build this
/// structure rather than updating any global counters directly.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Metrics {
    /// Cache misses
    pub cache_misses: u64,
    /// Cache hits
    pub cache_hits: u64,
    /// Queries sent to a nameserver which got a usable response.
    pub nameserver_hits: u64,
    /// Queries sent to a nameserver which failed: transport errors,
    /// malformed responses, and responses to some other question.
    pub nameserver_misses: u64,
    /// Referrals followed to a more specific zone.
    pub delegations: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit_or_miss<T>(&mut self, cached: &Option<T>) {
        if cached.is_some() {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }

    pub fn nameserver_hit(&mut self) {
        self.nameserver_hits += 1;
    }

    pub fn nameserver_miss(&mut self) {
        self.nameserver_misses += 1;
    }

    pub fn delegation(&mut self) {
        self.delegations += 1;
    }

    /// Total number of queries sent.
    pub fn queries(&self) -> u64 {
        self.nameserver_hits + self.nameserver_misses
    }
}
