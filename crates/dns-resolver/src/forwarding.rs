use rand::Rng;
use std::sync::Arc;
use tracing::Instrument;

use dns_types::protocol::types::*;

use crate::cache::is_negative;
use crate::context::Context;
use crate::discovery::ServerDiscovery;
use crate::util::nameserver::query_nameserver;
use crate::util::types::follow_cnames;
use crate::ResolutionError;

/// Settings for forwarding resolution.
pub struct ForwardingContextInner {
    discovery: Arc<dyn ServerDiscovery>,
}

impl ForwardingContextInner {
    pub fn new(discovery: Arc<dyn ServerDiscovery>) -> Self {
        Self { discovery }
    }
}

pub type ForwardingContext<'a> = Context<'a, ForwardingContextInner>;

/// Forwarding DNS resolution.
///
/// If the answer is not in the cache, the question is sent, with
/// recursion desired, to each upstream nameserver in turn until one
/// gives a response.  As the upstream can spoof any records it
/// wants, very little validation is done of its responses.
///
/// # Errors
///
/// See `ResolutionError`.
pub async fn resolve_forwarding(
    context: &mut ForwardingContext<'_>,
    question: &Question,
) -> Result<Message, ResolutionError> {
    let cached = context.cache.get(question);
    context.metrics().cache_hit_or_miss(&cached);
    if let Some(response) = cached {
        tracing::trace!("cache hit");
        return Ok(response);
    }

    let upstreams = context.r.discovery.list_servers();
    if upstreams.is_empty() {
        tracing::debug!("no upstream nameservers");
        return Err(ResolutionError::NoServers);
    }

    let root = DomainName::root_domain();
    for address in upstreams {
        context.visit(&root, address, question)?;

        let mut request = Message::from_question(rand::rng().random(), question.clone());
        request.header.recursion_desired = true;

        match query_nameserver(context.transport, &request, address)
            .instrument(tracing::error_span!("query_nameserver", %address))
            .await
        {
            Ok(response) => {
                context.metrics().nameserver_hit();

                let rcode = response.header.rcode;
                if rcode != Rcode::NoError && rcode != Rcode::NameError {
                    tracing::debug!(%address, %rcode, "upstream returned an error");
                    continue;
                }

                if follow_cnames(&response.answers, &question.name, question.qtype).is_some()
                    || is_negative(&response)
                {
                    context.cache.insert(question, &response);
                }
                return Ok(response);
            }
            Err(error) => {
                context.metrics().nameserver_miss();
                tracing::debug!(%address, %error, "upstream failed");
            }
        }
    }

    Err(ResolutionError::DeadEnd {
        question: question.clone(),
    })
}
