#![warn(clippy::pedantic)]
// Don't care enough to fix
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod cache;
pub mod context;
pub mod discovery;
pub mod forwarding;
pub mod metrics;
pub mod recursive;
pub mod transport;
pub mod util;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

use dns_types::protocol::types::*;
use dns_types::protocol::{deserialise, serialise};

use self::cache::{HarvestPolicy, SharedCache};
use self::context::Context;
use self::discovery::ServerDiscovery;
use self::forwarding::{resolve_forwarding, ForwardingContextInner};
use self::metrics::Metrics;
use self::recursive::{resolve_recursive, RecursiveContextInner};
use self::transport::{Transport, TransportError};
use self::util::nameserver::query_nameserver;

/// Maximum number of queries one resolution may send, including
/// those needed to find the addresses of nameservers and to follow
/// `CNAME`s.
pub const DEFAULT_MAX_STEPS: usize = 128;

/// How a resolver finds answers.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResolutionMode {
    /// Walk the delegation hierarchy from the root servers.
    #[default]
    Iterative,
    /// Forward questions, with recursion desired, to upstream
    /// nameservers.
    Recursive,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolverConfig {
    pub mode: ResolutionMode,
    pub max_steps: usize,
    pub cache_size: usize,
    pub harvest: HarvestPolicy,
    /// Whether "no such name" and "no such record" responses are
    /// cached.
    pub harvest_negative: bool,
    /// Port used for nameservers learned from referrals.
    pub port: u16,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::default(),
            max_steps: DEFAULT_MAX_STEPS,
            cache_size: 512,
            harvest: HarvestPolicy::default(),
            harvest_negative: false,
            port: 53,
        }
    }
}

/// A DNS resolver.  Cloning a `Resolver` gives a new handle to the
/// same cache.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn Transport>,
    discovery: Arc<dyn ServerDiscovery>,
    cache: SharedCache,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        transport: Arc<dyn Transport>,
        discovery: Arc<dyn ServerDiscovery>,
    ) -> Self {
        let cache =
            SharedCache::with_policy(config.cache_size, config.harvest, config.harvest_negative);
        Self::with_cache(config, transport, discovery, cache)
    }

    /// Create a resolver which uses an existing cache.  The cache's
    /// own capacity and harvesting settings are kept.
    pub fn with_cache(
        config: ResolverConfig,
        transport: Arc<dyn Transport>,
        discovery: Arc<dyn ServerDiscovery>,
        cache: SharedCache,
    ) -> Self {
        Self {
            transport,
            discovery,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a question, using the configured mode.
    ///
    /// The metrics are returned even if resolution fails.
    pub async fn resolve(&self, question: &Question) -> (Metrics, Result<Message, ResolutionError>) {
        async {
            match self.config.mode {
                ResolutionMode::Iterative => {
                    let inner = RecursiveContextInner::new(self.discovery.clone(), self.config.port);
                    let mut context = Context::new(
                        inner,
                        self.transport.as_ref(),
                        &self.cache,
                        self.config.max_steps,
                    );
                    let result = resolve_recursive(&mut context, question).await;
                    (context.done(), result)
                }
                ResolutionMode::Recursive => {
                    let inner = ForwardingContextInner::new(self.discovery.clone());
                    let mut context = Context::new(
                        inner,
                        self.transport.as_ref(),
                        &self.cache,
                        self.config.max_steps,
                    );
                    let result = resolve_forwarding(&mut context, question).await;
                    (context.done(), result)
                }
            }
        }
        .instrument(tracing::error_span!("resolve", %question))
        .await
    }

    /// Send a message to a nameserver as-is, with no caching.
    pub async fn query(
        &self,
        request: &Message,
        address: SocketAddr,
    ) -> Result<Message, ResolutionError> {
        query_nameserver(self.transport.as_ref(), request, address).await
    }
}

/// An error that can occur when trying to resolve a domain.
#[derive(Debug)]
pub enum ResolutionError {
    /// The request could not be serialised.
    Serialise(serialise::Error),
    /// The request could not be sent, or no response came back.
    Transport(TransportError),
    /// The response could not be deserialised.
    Malformed(deserialise::Error),
    /// The response was not for the request.
    Mismatched { address: SocketAddr },
    /// The same question was about to be sent to the same server, for
    /// the same zone, twice.
    LoopDetected {
        zone: DomainName,
        address: SocketAddr,
        question: Question,
    },
    /// The resolution sent as many queries as it is allowed.
    MaxStepsReached { limit: usize },
    /// Every candidate nameserver failed.
    DeadEnd { question: Question },
    /// There were no servers to start from.
    NoServers,
}

impl ResolutionError {
    /// Whether this error ends the whole resolution, rather than just
    /// the current attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResolutionError::LoopDetected { .. } | ResolutionError::MaxStepsReached { .. }
        )
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolutionError::Serialise(error) => write!(f, "could not serialise request: {error}"),
            ResolutionError::Transport(error) => write!(f, "transport error: {error}"),
            ResolutionError::Malformed(error) => write!(f, "malformed response: {error}"),
            ResolutionError::Mismatched { address } => {
                write!(f, "response from {address} does not match request")
            }
            ResolutionError::LoopDetected {
                zone,
                address,
                question,
            } => write!(
                f,
                "delegation loop: already asked {address} about '{question}' for zone '{zone}'"
            ),
            ResolutionError::MaxStepsReached { limit } => {
                write!(f, "gave up after {limit} queries")
            }
            ResolutionError::DeadEnd { question } => {
                write!(f, "unable to resolve '{question}': no nameserver could answer")
            }
            ResolutionError::NoServers => write!(f, "no nameservers to query"),
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolutionError::Serialise(error) => Some(error),
            ResolutionError::Transport(error) => Some(error),
            ResolutionError::Malformed(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serialise::Error> for ResolutionError {
    fn from(error: serialise::Error) -> Self {
        ResolutionError::Serialise(error)
    }
}

impl From<TransportError> for ResolutionError {
    fn from(error: TransportError) -> Self {
        ResolutionError::Transport(error)
    }
}

impl From<deserialise::Error> for ResolutionError {
    fn from(error: deserialise::Error) -> Self {
        ResolutionError::Malformed(error)
    }
}
