use async_recursion::async_recursion;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

use dns_types::protocol::types::*;

use crate::cache::is_negative;
use crate::context::Context;
use crate::discovery::ServerDiscovery;
use crate::util::nameserver::query_nameserver;
use crate::util::types::*;
use crate::ResolutionError;

/// Settings for iterative resolution.
pub struct RecursiveContextInner {
    discovery: Arc<dyn ServerDiscovery>,
    root_servers: Option<Vec<SocketAddr>>,
    /// The port nameservers found through referrals are queried on.
    pub port: u16,
}

impl RecursiveContextInner {
    pub fn new(discovery: Arc<dyn ServerDiscovery>, port: u16) -> Self {
        Self {
            discovery,
            root_servers: None,
            port,
        }
    }

    /// The servers for the root zone.  Discovery is only consulted
    /// the first time this is called.
    fn root_servers(&mut self) -> Vec<SocketAddr> {
        self.root_servers
            .get_or_insert_with(|| self.discovery.list_servers())
            .clone()
    }
}

pub type RecursiveContext<'a> = Context<'a, RecursiveContextInner>;

/// Iterative DNS resolution.
///
/// This corresponds to the standard resolver algorithm.  If the
/// answer is not in the cache, it will call out to remote
/// nameservers, starting with the closest enclosing zone whose
/// nameservers are cached, or else the root servers.  Referrals are
/// followed until a server gives an answer.
///
/// If the answer is a `CNAME` to some other name, that name is
/// resolved too and its answers included.
///
/// See section 5.3.3 of RFC 1034.
///
/// # Errors
///
/// See `ResolutionError`.
#[async_recursion]
pub async fn resolve_recursive<'a>(
    context: &mut RecursiveContext<'a>,
    question: &Question,
) -> Result<Message, ResolutionError> {
    let mut response = resolve_recursive_nocname(context, question).await?;

    let Some(target) = dangling_cname(&response.answers, question) else {
        return Ok(response);
    };

    let cname_question = Question {
        name: target,
        qtype: question.qtype,
        qclass: question.qclass,
    };

    if cname_question == *question || context.is_duplicate_question(&cname_question) {
        tracing::debug!(%cname_question, "hit duplicate question");
        return Ok(response);
    }

    tracing::trace!(%cname_question, "following CNAME");
    context.push_question(question);
    let cname_response = resolve_recursive(context, &cname_question)
        .instrument(tracing::error_span!("resolve_cname", %cname_question))
        .await;
    context.pop_question();

    let cname_response = cname_response?;
    response.header.rcode = cname_response.header.rcode;
    prioritising_merge(&mut response.answers, cname_response.answers);
    response.authority = cname_response.authority;
    response.additional = cname_response.additional;
    Ok(response)
}

/// Resolve a question, without following `CNAME`s.
async fn resolve_recursive_nocname(
    context: &mut RecursiveContext<'_>,
    question: &Question,
) -> Result<Message, ResolutionError> {
    let cached = context.cache.get(question);
    context.metrics().cache_hit_or_miss(&cached);
    if let Some(response) = cached {
        tracing::trace!("cache hit");
        return Ok(response);
    }

    let (zone, candidates) = candidate_nameservers(context, &question.name);
    if candidates.is_empty() {
        tracing::debug!("no servers to query");
        return Err(ResolutionError::NoServers);
    }

    for address in candidates {
        match query_recursive(context, question, address, &zone).await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => tracing::debug!(%address, %error, "candidate failed"),
        }
    }

    tracing::trace!("out of candidates");
    Err(ResolutionError::DeadEnd {
        question: question.clone(),
    })
}

/// Ask one server, for the given zone, a question.  Referrals to a
/// more specific zone (or to other servers for the same zone) are
/// followed.
///
/// # Errors
///
/// See `ResolutionError`.  Only `LoopDetected` and `MaxStepsReached`
/// mean the caller should give up: anything else means this server
/// or those it referred to could not give an answer.
#[async_recursion]
pub async fn query_recursive<'a>(
    context: &mut RecursiveContext<'a>,
    question: &Question,
    address: SocketAddr,
    zone: &DomainName,
) -> Result<Message, ResolutionError> {
    let cached = context.cache.get(question);
    context.metrics().cache_hit_or_miss(&cached);
    if let Some(response) = cached {
        tracing::trace!("cache hit");
        return Ok(response);
    }

    context.visit(zone, address, question)?;

    let request = Message::from_question(rand::rng().random(), question.clone());
    let response = match query_nameserver(context.transport, &request, address)
        .instrument(tracing::error_span!("query_nameserver", %address, %zone))
        .await
    {
        Ok(response) => {
            context.metrics().nameserver_hit();
            response
        }
        Err(error) => {
            context.metrics().nameserver_miss();
            return Err(error);
        }
    };

    let rcode = response.header.rcode;
    if rcode != Rcode::NoError && rcode != Rcode::NameError {
        tracing::debug!(%address, %rcode, "nameserver returned an error");
        return Err(ResolutionError::DeadEnd {
            question: question.clone(),
        });
    }

    let answers = follow_cnames(&response.answers, &question.name, question.qtype).is_some();
    if response.header.is_authoritative || answers || rcode == Rcode::NameError {
        tracing::trace!(%answers, "got final response");
        if answers || is_negative(&response) {
            context.cache.insert_in_zone(question, &response, zone);
        }
        return Ok(response);
    }

    context.cache.insert_harvest_only(question, &response, zone);

    let Some(delegation) = get_better_ns_names(&response.authority, &question.name, zone) else {
        if let Some(error) = upward_referral_loop(context, question, &response) {
            return Err(error);
        }
        tracing::debug!("response is neither an answer nor a referral");
        return Err(ResolutionError::DeadEnd {
            question: question.clone(),
        });
    };

    context.metrics().delegation();
    tracing::trace!(zone = %delegation.name, hostnames = ?delegation.hostnames, "got delegation");

    let port = context.r.port;
    let mut glued = Vec::new();
    let mut unglued = Vec::new();
    for hostname in delegation.hostnames {
        let ips = get_ips(&response.additional, &hostname);
        if ips.is_empty() {
            unglued.push(hostname);
        } else {
            glued.extend(ips.into_iter().map(|ip| SocketAddr::new(ip, port)));
        }
    }

    for candidate in glued {
        match query_recursive(context, question, candidate, &delegation.name).await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => tracing::debug!(address = %candidate, %error, "candidate failed"),
        }
    }

    let is_address_question = question.qtype == QueryType::Record(RecordType::A)
        || question.qtype == QueryType::Record(RecordType::AAAA);
    for hostname in unglued {
        if is_address_question && hostname == question.name {
            tracing::trace!(%hostname, "skipping nameserver which is the question");
            continue;
        }

        let ns_question = Question {
            name: hostname.clone(),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        };
        let ips = match resolve_recursive(context, &ns_question)
            .instrument(tracing::error_span!("resolve_nameserver", %ns_question))
            .await
        {
            Ok(response) => get_ips(&response.answers, &hostname),
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                tracing::debug!(%hostname, %error, "could not resolve nameserver");
                continue;
            }
        };

        for ip in ips {
            let candidate = SocketAddr::new(ip, port);
            match query_recursive(context, question, candidate, &delegation.name).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => tracing::debug!(address = %candidate, %error, "candidate failed"),
            }
        }
    }

    tracing::trace!("out of candidates");
    Err(ResolutionError::DeadEnd {
        question: question.clone(),
    })
}

/// A referral back up to an enclosing zone is not followed, but if it
/// points at a server already asked this question for that zone then
/// the delegation chain is a loop.
fn upward_referral_loop(
    context: &mut RecursiveContext<'_>,
    question: &Question,
    response: &Message,
) -> Option<ResolutionError> {
    let referral = get_better_ns_names(
        &response.authority,
        &question.name,
        &DomainName::root_domain(),
    )?;

    let port = context.r.port;
    for hostname in &referral.hostnames {
        let mut ips = get_ips(&response.additional, hostname);
        for rtype in [RecordType::A, RecordType::AAAA] {
            let address_question = Question {
                name: hostname.clone(),
                qtype: QueryType::Record(rtype),
                qclass: QueryClass::Record(RecordClass::IN),
            };
            if let Some(address_response) = context.cache.get(&address_question) {
                ips.extend(get_ips(&address_response.answers, hostname));
            }
        }

        for ip in ips {
            let address = SocketAddr::new(ip, port);
            if context.has_visited(&referral.name, address, question) {
                tracing::debug!(zone = %referral.name, %address, "upward referral to visited server");
                return Some(ResolutionError::LoopDetected {
                    zone: referral.name,
                    address,
                    question: question.clone(),
                });
            }
        }
    }

    None
}

/// Get the best nameservers by looking them up in the cache for the
/// domain and all its superdomains, in order.  A zone is only used
/// if the addresses of some of its nameservers are cached as well.
/// If no nameservers are found, the root servers are returned.
///
/// This corresponds to step 2 of the standard resolver algorithm.
fn candidate_nameservers(
    context: &mut RecursiveContext<'_>,
    name: &DomainName,
) -> (DomainName, Vec<SocketAddr>) {
    let port = context.r.port;

    for keep in (1..=name.label_count()).rev() {
        let zone = name.strip_to(keep);
        let ns_question = Question {
            name: zone.clone(),
            qtype: QueryType::Record(RecordType::NS),
            qclass: QueryClass::Record(RecordClass::IN),
        };

        let Some(ns_response) = context.cache.get(&ns_question) else {
            continue;
        };

        let mut addresses = Vec::new();
        for rr in &ns_response.answers {
            if let RecordTypeWithData::NS { nsdname } = &rr.rtype_with_data {
                for rtype in [RecordType::A, RecordType::AAAA] {
                    let address_question = Question {
                        name: nsdname.clone(),
                        qtype: QueryType::Record(rtype),
                        qclass: QueryClass::Record(RecordClass::IN),
                    };
                    if let Some(address_response) = context.cache.get(&address_question) {
                        addresses.extend(
                            get_ips(&address_response.answers, nsdname)
                                .into_iter()
                                .map(|ip| SocketAddr::new(ip, port)),
                        );
                    }
                }
            }
        }

        if !addresses.is_empty() {
            tracing::trace!(%zone, "starting from cached nameservers");
            return (zone, addresses);
        }
    }

    (DomainName::root_domain(), context.r.root_servers())
}

#[cfg(test)]
mod tests {
    use dns_types::protocol::types::test_util::*;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::cache::test_util::*;
    use crate::cache::SharedCache;
    use crate::discovery::StaticServers;
    use crate::metrics::Metrics;
    use crate::transport::Protocol;
    use crate::util::test_util::*;

    async fn resolve_with(
        transport: &StubTransport,
        cache: &SharedCache,
        roots: Vec<SocketAddr>,
        max_steps: usize,
        question: &Question,
    ) -> (Metrics, Result<Message, ResolutionError>) {
        let inner = RecursiveContextInner::new(Arc::new(StaticServers::new(roots)), 53);
        let mut context = Context::new(inner, transport, cache, max_steps);
        let result = resolve_recursive(&mut context, question).await;
        (context.done(), result)
    }

    fn delegating_transport() -> StubTransport {
        StubTransport::new()
            .with_handler(
                server_address(1),
                zone_server(vec![
                    ns_record("com.", "ns.com."),
                    a_record("ns.com.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            )
            .with_handler(
                glue_address(1),
                zone_server(vec![
                    ns_record("example.com.", "ns.example.com."),
                    a_record("ns.example.com.", Ipv4Addr::new(1, 1, 1, 2)),
                ]),
            )
            .with_handler(
                glue_address(2),
                zone_server(vec![a_record(
                    "www.example.com.",
                    Ipv4Addr::new(1, 1, 1, 3),
                )]),
            )
    }

    fn looping_transport() -> StubTransport {
        StubTransport::new()
            .with_handler(
                server_address(1),
                zone_server(vec![
                    ns_record("example.com.", "ns.a.example.com."),
                    a_record("ns.a.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            )
            .with_handler(
                glue_address(1),
                zone_server(vec![
                    ns_record("example.com.", "ns.b.example.com."),
                    a_record("ns.b.example.com.", Ipv4Addr::new(1, 1, 1, 2)),
                ]),
            )
            .with_handler(
                glue_address(2),
                zone_server(vec![
                    ns_record("example.com.", "ns.a.example.com."),
                    a_record("ns.a.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            )
    }

    #[tokio::test]
    async fn follows_delegations() {
        let transport = delegating_transport();
        let cache = SharedCache::new();

        let (metrics, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert_eq!(
            vec![a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 3))],
            result.unwrap().answers
        );
        assert_eq!(
            vec![
                (Protocol::Udp, server_address(1)),
                (Protocol::Udp, glue_address(1)),
                (Protocol::Udp, glue_address(2)),
            ],
            transport.calls()
        );
        assert_eq!(3, metrics.nameserver_hits);
        assert_eq!(2, metrics.delegations);
    }

    #[tokio::test]
    async fn answers_are_cached() {
        let transport = delegating_transport();
        let cache = SharedCache::new();
        let question = question_a("www.example.com.");

        let (_, first) = resolve_with(&transport, &cache, vec![server_address(1)], 128, &question).await;
        let (metrics, second) =
            resolve_with(&transport, &cache, vec![server_address(1)], 128, &question).await;

        assert_eq!(first.unwrap().answers, second.unwrap().answers);
        assert_eq!(3, transport.calls().len());
        assert_eq!(1, metrics.cache_hits);
        assert_eq!(0, metrics.queries());
    }

    #[tokio::test]
    async fn starts_from_cached_delegation() {
        let transport = delegating_transport();
        let cache = SharedCache::new();
        let (ns_question, ns_response) = answer_with(ns_record("example.com.", "ns.example.com."));
        cache.insert(&ns_question, &ns_response);
        let (a_question, a_response) =
            answer_with(a_record("ns.example.com.", Ipv4Addr::new(1, 1, 1, 2)));
        cache.insert(&a_question, &a_response);

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(vec![(Protocol::Udp, glue_address(2))], transport.calls());
    }

    #[tokio::test]
    async fn detects_delegation_loops() {
        let transport = looping_transport();
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        match result {
            Err(ResolutionError::LoopDetected { zone, address, .. }) => {
                assert_eq!(domain("example.com."), zone);
                assert_eq!(glue_address(1), address);
            }
            other => panic!("expected LoopDetected, got {other:?}"),
        }
        assert_eq!(3, transport.calls().len());
    }

    #[tokio::test]
    async fn detects_delegation_loops_between_zones() {
        let transport = StubTransport::new()
            .with_handler(
                server_address(1),
                zone_server(vec![
                    ns_record("example.com.", "ns.a.example.com."),
                    a_record("ns.a.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            )
            .with_handler(
                glue_address(1),
                zone_server(vec![
                    ns_record("www.example.com.", "ns.b.example.com."),
                    a_record("ns.b.example.com.", Ipv4Addr::new(1, 1, 1, 2)),
                ]),
            )
            .with_handler(
                glue_address(2),
                zone_server(vec![
                    ns_record("example.com.", "ns.a.example.com."),
                    a_record("ns.a.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            );
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        match result {
            Err(ResolutionError::LoopDetected { zone, address, .. }) => {
                assert_eq!(domain("example.com."), zone);
                assert_eq!(glue_address(1), address);
            }
            other => panic!("expected LoopDetected, got {other:?}"),
        }
        assert_eq!(
            vec![
                (Protocol::Udp, server_address(1)),
                (Protocol::Udp, glue_address(1)),
                (Protocol::Udp, glue_address(2)),
            ],
            transport.calls()
        );
    }

    #[tokio::test]
    async fn upward_referral_to_new_server_is_dead_end() {
        let transport = StubTransport::new()
            .with_handler(
                server_address(1),
                zone_server(vec![
                    ns_record("www.example.com.", "ns.b.example.com."),
                    a_record("ns.b.example.com.", Ipv4Addr::new(1, 1, 1, 2)),
                ]),
            )
            .with_handler(
                glue_address(2),
                zone_server(vec![
                    ns_record("example.com.", "ns.a.example.com."),
                    a_record("ns.a.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            );
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert!(matches!(result, Err(ResolutionError::DeadEnd { .. })));
        assert_eq!(2, transport.calls().len());
    }

    #[tokio::test]
    async fn stops_after_max_steps() {
        let transport = looping_transport();
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            2,
            &question_a("www.example.com."),
        )
        .await;

        assert!(matches!(
            result,
            Err(ResolutionError::MaxStepsReached { limit: 2 })
        ));
        assert_eq!(2, transport.calls().len());
    }

    #[tokio::test]
    async fn moves_on_from_failed_servers() {
        let transport = delegating_transport();
        let cache = SharedCache::new();

        let (metrics, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(9), server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(1, metrics.nameserver_misses);
        assert_eq!(3, metrics.nameserver_hits);
    }

    #[tokio::test]
    async fn dead_end_when_all_servers_fail() {
        let transport = StubTransport::new();
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1), server_address(2)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert!(matches!(result, Err(ResolutionError::DeadEnd { .. })));
        assert_eq!(2, transport.calls().len());
    }

    #[tokio::test]
    async fn no_servers() {
        let transport = StubTransport::new();
        let cache = SharedCache::new();

        let (_, result) =
            resolve_with(&transport, &cache, Vec::new(), 128, &question_a("www.example.com.")).await;

        assert!(matches!(result, Err(ResolutionError::NoServers)));
    }

    #[tokio::test]
    async fn resolves_glueless_nameservers() {
        let transport = StubTransport::new()
            .with_handler(
                server_address(1),
                zone_server(vec![
                    ns_record("example.com.", "ns.example.net."),
                    ns_record("example.net.", "ns1.example.net."),
                    a_record("ns1.example.net.", Ipv4Addr::new(1, 1, 1, 1)),
                ]),
            )
            .with_handler(
                glue_address(1),
                zone_server(vec![a_record("ns.example.net.", Ipv4Addr::new(1, 1, 1, 2))]),
            )
            .with_handler(
                glue_address(2),
                zone_server(vec![a_record(
                    "www.example.com.",
                    Ipv4Addr::new(1, 1, 1, 3),
                )]),
            );
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert_eq!(
            vec![a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 3))],
            result.unwrap().answers
        );
        assert_eq!(
            vec![
                (Protocol::Udp, server_address(1)),
                (Protocol::Udp, server_address(1)),
                (Protocol::Udp, glue_address(1)),
                (Protocol::Udp, glue_address(2)),
            ],
            transport.calls()
        );
    }

    #[tokio::test]
    async fn skips_nameserver_which_is_the_question() {
        let transport = StubTransport::new().with_handler(
            server_address(1),
            zone_server(vec![ns_record("example.com.", "example.com.")]),
        );
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("example.com."),
        )
        .await;

        assert!(matches!(result, Err(ResolutionError::DeadEnd { .. })));
        assert_eq!(1, transport.calls().len());
    }

    #[tokio::test]
    async fn follows_cnames() {
        let transport = StubTransport::new().with_handler(
            server_address(1),
            zone_server(vec![
                cname_record("www.example.com.", "target.example.net."),
                a_record("target.example.net.", Ipv4Addr::new(1, 1, 1, 9)),
            ]),
        );
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert_eq!(
            vec![
                cname_record("www.example.com.", "target.example.net."),
                a_record("target.example.net.", Ipv4Addr::new(1, 1, 1, 9)),
            ],
            result.unwrap().answers
        );
    }

    #[tokio::test]
    async fn stops_at_cname_loops() {
        let transport = StubTransport::new().with_handler(
            server_address(1),
            zone_server(vec![
                cname_record("a.example.com.", "b.example.com."),
                cname_record("b.example.com.", "a.example.com."),
            ]),
        );
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("a.example.com."),
        )
        .await;

        assert_eq!(
            vec![
                cname_record("a.example.com.", "b.example.com."),
                cname_record("b.example.com.", "a.example.com."),
            ],
            result.unwrap().answers
        );
        assert_eq!(2, transport.calls().len());
    }

    #[tokio::test]
    async fn name_errors_are_final() {
        let transport = StubTransport::new().with_handler(server_address(1), zone_server(Vec::new()));
        let cache = SharedCache::new();

        let (_, result) = resolve_with(
            &transport,
            &cache,
            vec![server_address(1)],
            128,
            &question_a("www.example.com."),
        )
        .await;

        assert_eq!(Rcode::NameError, result.unwrap().header.rcode);
        assert!(cache.is_empty());
    }
}
