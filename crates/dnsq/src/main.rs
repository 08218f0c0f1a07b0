use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use dns_resolver::cache::HarvestPolicy;
use dns_resolver::discovery::{root_hints, ServerDiscovery, StaticServers};
use dns_resolver::transport::NetworkTransport;
use dns_resolver::{ResolutionMode, Resolver, ResolverConfig, DEFAULT_MAX_STEPS};
use dns_types::protocol::types::{
    DomainName, Message, QueryClass, QueryType, Question, RecordClass, RecordType, ResourceRecord,
};

fn format_name(name: &DomainName, unicode: bool) -> String {
    if unicode {
        name.to_unicode_string()
    } else {
        name.to_dotted_string()
    }
}

fn print_section(heading: &str, rrs: &[ResourceRecord], unicode: bool) {
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {heading}");
    for rr in rrs {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            format_name(&rr.name, unicode),
            rr.ttl,
            rr.rclass,
            rr.rtype_with_data.rtype(),
            rr.rtype_with_data
        );
    }
}

fn print_response(response: &Message, unicode: bool) {
    println!(
        "\n;; HEADER\n; rcode: {}, authoritative: {}, truncated: {}",
        response.header.rcode, response.header.is_authoritative, response.header.is_truncated
    );
    print_section("ANSWER", &response.answers, unicode);
    print_section("AUTHORITY", &response.authority, unicode);
    print_section("ADDITIONAL", &response.additional, unicode);
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Harvest {
    Exact,
    Extended,
    Full,
}

impl From<Harvest> for HarvestPolicy {
    fn from(harvest: Harvest) -> Self {
        match harvest {
            Harvest::Exact => HarvestPolicy::Exact,
            Harvest::Extended => HarvestPolicy::Extended,
            Harvest::Full => HarvestPolicy::Full,
        }
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// DNS lookup utility
///
/// Resolves a name by walking the delegation hierarchy from the root
/// servers (or from the given servers), or with --recursive by
/// forwarding the question to upstream nameservers.
/// Set `RUST_LOG=trace` to see each query as it happens.
struct Args {
    /// Domain name to resolve
    #[clap(value_parser)]
    domain: DomainName,

    /// Query type to resolve
    #[clap(default_value_t = QueryType::Record(RecordType::A), value_parser)]
    qtype: QueryType,

    /// Start from these nameservers instead of the root servers, can be
    /// specified more than once
    #[clap(short, long, value_parser, value_delimiter = ',', env = "DNSQ_SERVER")]
    server: Vec<SocketAddr>,

    /// Forward the question, with recursion desired, to the --server
    /// nameservers rather than following delegations from them
    #[clap(short, long, action(clap::ArgAction::SetTrue), requires = "server")]
    recursive: bool,

    /// Maximum number of queries to send for one resolution
    #[clap(long, default_value_t = DEFAULT_MAX_STEPS, env = "DNSQ_MAX_STEPS")]
    max_steps: usize,

    /// Which records from responses other than the answer are cached
    #[clap(long, value_enum, default_value_t = Harvest::Extended)]
    harvest: Harvest,

    /// Timeout, in seconds, for each query sent
    #[clap(short, long, default_value_t = 5)]
    timeout: u64,

    /// Show internationalised names in their Unicode form
    #[clap(short, long, action(clap::ArgAction::SetTrue))]
    unicode: bool,

    /// Log in JSON
    #[clap(long, action(clap::ArgAction::SetTrue))]
    json: bool,
}

impl Args {
    fn mode(&self) -> ResolutionMode {
        if self.recursive {
            ResolutionMode::Recursive
        } else {
            ResolutionMode::Iterative
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if args.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let question = Question {
        name: args.domain.clone(),
        qtype: args.qtype,
        qclass: QueryClass::Record(RecordClass::IN),
    };

    let config = ResolverConfig {
        mode: args.mode(),
        max_steps: args.max_steps,
        harvest: args.harvest.into(),
        ..ResolverConfig::default()
    };
    let discovery: Arc<dyn ServerDiscovery> = if args.server.is_empty() {
        Arc::new(root_hints())
    } else {
        Arc::new(StaticServers::new(args.server))
    };
    let transport = Arc::new(NetworkTransport::new(Duration::from_secs(args.timeout)));
    let resolver = Resolver::new(config, transport, discovery);

    println!(";; QUESTION");
    println!(
        "{}\t{}\t{}",
        format_name(&question.name, args.unicode),
        question.qclass,
        question.qtype
    );

    let (metrics, response) = resolver.resolve(&question).await;
    tracing::debug!(
        queries = %metrics.queries(),
        cache_hits = %metrics.cache_hits,
        delegations = %metrics.delegations,
        "done"
    );

    match response {
        Ok(response) => print_response(&response, args.unicode),
        Err(err) => {
            println!("\n;; ANSWER");
            println!("; {err}");
            process::exit(1);
        }
    }
}
