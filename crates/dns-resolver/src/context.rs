use std::collections::HashSet;
use std::net::SocketAddr;

use dns_types::protocol::types::*;

use crate::cache::SharedCache;
use crate::metrics::Metrics;
use crate::transport::Transport;
use crate::ResolutionError;

/// The state of one resolution.  Nested lookups (for nameserver
/// addresses, or `CNAME` targets) share the context of the lookup
/// which started them, so the step limit and loop detection cover
/// the whole resolution.
pub struct Context<'a, CT> {
    // global context
    pub r: CT,
    pub transport: &'a dyn Transport,
    pub cache: &'a SharedCache,
    // request state
    steps: usize,
    max_steps: usize,
    visited: HashSet<(DomainName, SocketAddr, Question)>,
    question_stack: Vec<Question>,
    metrics: Metrics,
}

impl<'a, CT> Context<'a, CT> {
    pub fn new(
        r: CT,
        transport: &'a dyn Transport,
        cache: &'a SharedCache,
        max_steps: usize,
    ) -> Self {
        Self {
            r,
            transport,
            cache,
            steps: 0,
            max_steps,
            visited: HashSet::new(),
            question_stack: Vec::new(),
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    pub fn done(self) -> Metrics {
        self.metrics
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Record that `question` is about to be sent to `address`, as a
    /// server for `zone`.
    ///
    /// # Errors
    ///
    /// `LoopDetected` if this exact query has been made before in
    /// this resolution, and `MaxStepsReached` if it would take the
    /// resolution over its step limit.
    pub fn visit(
        &mut self,
        zone: &DomainName,
        address: SocketAddr,
        question: &Question,
    ) -> Result<(), ResolutionError> {
        if !self
            .visited
            .insert((zone.clone(), address, question.clone()))
        {
            tracing::debug!(%zone, %address, "hit delegation loop");
            return Err(ResolutionError::LoopDetected {
                zone: zone.clone(),
                address,
                question: question.clone(),
            });
        }

        self.steps += 1;
        if self.steps > self.max_steps {
            tracing::debug!(limit = %self.max_steps, "hit step limit");
            return Err(ResolutionError::MaxStepsReached {
                limit: self.max_steps,
            });
        }

        Ok(())
    }

    /// Whether `visit` has already been called with these arguments.
    pub fn has_visited(
        &self,
        zone: &DomainName,
        address: SocketAddr,
        question: &Question,
    ) -> bool {
        self.visited
            .contains(&(zone.clone(), address, question.clone()))
    }

    pub fn is_duplicate_question(&self, question: &Question) -> bool {
        self.question_stack.contains(question)
    }

    pub fn push_question(&mut self, question: &Question) {
        self.question_stack.push(question.clone());
    }

    pub fn pop_question(&mut self) {
        self.question_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use dns_types::protocol::types::test_util::*;

    use super::*;
    use crate::util::test_util::*;

    fn question() -> Question {
        Question {
            name: domain("www.example.com."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        }
    }

    #[test]
    fn visit_rejects_repeats() {
        let transport = StubTransport::new();
        let cache = SharedCache::new();
        let mut context = Context::new((), &transport, &cache, 10);

        let zone = domain("example.com.");
        assert!(context.visit(&zone, server_address(1), &question()).is_ok());
        assert!(context.visit(&zone, server_address(2), &question()).is_ok());
        assert!(context
            .visit(&domain("com."), server_address(1), &question())
            .is_ok());

        match context.visit(&zone, server_address(1), &question()) {
            Err(ResolutionError::LoopDetected {
                zone: loop_zone,
                address,
                question: loop_question,
            }) => {
                assert_eq!(zone, loop_zone);
                assert_eq!(server_address(1), address);
                assert_eq!(question(), loop_question);
            }
            other => panic!("expected LoopDetected, got {other:?}"),
        }
    }

    #[test]
    fn has_visited_does_not_count_steps() {
        let transport = StubTransport::new();
        let cache = SharedCache::new();
        let mut context = Context::new((), &transport, &cache, 10);

        let zone = domain("example.com.");
        assert!(!context.has_visited(&zone, server_address(1), &question()));
        assert!(context.visit(&zone, server_address(1), &question()).is_ok());
        assert!(context.has_visited(&zone, server_address(1), &question()));
        assert!(!context.has_visited(&domain("com."), server_address(1), &question()));
        assert_eq!(1, context.steps());
    }

    #[test]
    fn visit_counts_steps() {
        let transport = StubTransport::new();
        let cache = SharedCache::new();
        let mut context = Context::new((), &transport, &cache, 2);

        let zone = DomainName::root_domain();
        assert!(context.visit(&zone, server_address(1), &question()).is_ok());
        assert!(context.visit(&zone, server_address(2), &question()).is_ok());
        assert!(matches!(
            context.visit(&zone, server_address(3), &question()),
            Err(ResolutionError::MaxStepsReached { limit: 2 })
        ));
        assert_eq!(3, context.steps());
    }

    #[test]
    fn question_stack() {
        let transport = StubTransport::new();
        let cache = SharedCache::new();
        let mut context = Context::new((), &transport, &cache, 2);

        assert!(!context.is_duplicate_question(&question()));
        context.push_question(&question());
        assert!(context.is_duplicate_question(&question()));
        context.pop_question();
        assert!(!context.is_duplicate_question(&question()));
    }
}
