use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use dns_types::protocol::types::*;

/// A set of nameservers for a zone, in the order the referral gave
/// them.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Nameservers {
    pub hostnames: Vec<DomainName>,
    pub name: DomainName,
}

impl Nameservers {
    pub fn match_count(&self) -> usize {
        self.name.labels.len()
    }
}

/// Given a set of RRs and a domain name we're looking for, follow
/// `CNAME`s in the response and return the final name (which is the
/// name that will have the non-`CNAME` records associated with it).
///
/// Returns `None` if CNAMEs form a loop, or there is no RR which
/// matches the target name (a CNAME or one with the right type).
pub fn follow_cnames(
    rrs: &[ResourceRecord],
    target: &DomainName,
    qtype: QueryType,
) -> Option<(DomainName, HashMap<DomainName, DomainName>)> {
    let mut got_match = false;
    let mut cname_map = HashMap::<DomainName, DomainName>::new();
    for rr in rrs {
        if &rr.name == target && rr.rtype_with_data.matches(qtype) {
            got_match = true;
        }
        if let RecordTypeWithData::CNAME { cname } = &rr.rtype_with_data {
            cname_map.insert(rr.name.clone(), cname.clone());
        }
    }

    let mut seen = HashSet::new();
    let mut final_name = target.clone();
    while let Some(target) = cname_map.get(&final_name) {
        if seen.contains(target) {
            return None;
        }
        seen.insert(target.clone());
        final_name = target.clone();
    }

    if got_match || !seen.is_empty() {
        Some((final_name, cname_map))
    } else {
        None
    }
}

/// Whether the answer section has a record of the right type for the
/// question name, or for the name it ends up being after following
/// `CNAME`s.
pub fn has_final_answer(rrs: &[ResourceRecord], question: &Question) -> bool {
    if let Some((final_name, _)) = follow_cnames(rrs, &question.name, question.qtype) {
        rrs.iter()
            .any(|rr| rr.name == final_name && rr.rtype_with_data.matches(question.qtype))
    } else {
        false
    }
}

/// If the answer section starts a `CNAME` chain at the question name
/// but has no record of the right type at the end of it, the name
/// the chain ends at.
pub fn dangling_cname(rrs: &[ResourceRecord], question: &Question) -> Option<DomainName> {
    if question.qtype == QueryType::Record(RecordType::CNAME) || question.qtype == QueryType::Wildcard {
        return None;
    }

    let (final_name, _) = follow_cnames(rrs, &question.name, question.qtype)?;
    if final_name == question.name || has_final_answer(rrs, question) {
        None
    } else {
        Some(final_name)
    }
}

/// Given a set of RRs and a domain name we're looking for, look for
/// the most specific `NS` RRs which are for a superdomain of it, and
/// are at least as specific as the current zone.
///
/// Returns the delegated zone and the nameserver hostnames.
pub fn get_better_ns_names(
    rrs: &[ResourceRecord],
    target: &DomainName,
    current_zone: &DomainName,
) -> Option<Nameservers> {
    let mut best: Option<Nameservers> = None;

    for rr in rrs {
        if let RecordTypeWithData::NS { nsdname } = &rr.rtype_with_data {
            if !target.is_subdomain_of(&rr.name) || !rr.name.is_subdomain_of(current_zone) {
                continue;
            }

            match &mut best {
                Some(ns) if ns.name == rr.name => {
                    if !ns.hostnames.contains(nsdname) {
                        ns.hostnames.push(nsdname.clone());
                    }
                }
                Some(ns) if ns.match_count() >= rr.name.labels.len() => (),
                _ => {
                    best = Some(Nameservers {
                        hostnames: vec![nsdname.clone()],
                        name: rr.name.clone(),
                    });
                }
            }
        }
    }

    best
}

/// Given a set of RRs and a domain name we're looking for, follow any
/// `CNAME`s in the response and get the addresses from the final `A`
/// and `AAAA` records.
pub fn get_ips(rrs: &[ResourceRecord], target: &DomainName) -> Vec<IpAddr> {
    let final_name = follow_cnames(rrs, target, QueryType::Record(RecordType::A))
        .or_else(|| follow_cnames(rrs, target, QueryType::Record(RecordType::AAAA)))
        .map_or_else(|| target.clone(), |(name, _)| name);

    let mut ips = Vec::new();
    for rr in rrs {
        if rr.name != final_name {
            continue;
        }
        match &rr.rtype_with_data {
            RecordTypeWithData::A { address } => ips.push(IpAddr::V4(*address)),
            RecordTypeWithData::AAAA { address } => ips.push(IpAddr::V6(*address)),
            _ => (),
        }
    }
    ips
}

/// Merge two sets of RRs, where records from the second set are
/// included if and only if there are no records of matching (name,
/// type) in the first set.
///
/// For example, if the first set is:
///
/// ```text
/// example.com. 300 IN A 1.1.1.1
/// example.com. 300 IN A 2.2.2.2
/// ```
///
/// And the second set is:
///
/// ```text
/// example.com. 300 IN A 3.3.3.3
/// example.net. 300 IN A 3.3.3.3
/// example.com. 300 IN MX mail.example.com.
/// ```
///
/// Then the output will be:
///
/// ```text
/// example.com. 300 IN A 1.1.1.1
/// example.com. 300 IN A 2.2.2.2
/// example.net. 300 IN A 3.3.3.3
/// example.com. 300 IN MX mail.example.com.
/// ```
///
/// Where the A records for `example.com.` have been dropped.  The
/// first set acts as an override of the second.
pub fn prioritising_merge(priority: &mut Vec<ResourceRecord>, new: Vec<ResourceRecord>) {
    let mut seen = HashSet::new();

    for rr in priority.iter() {
        seen.insert((rr.name.clone(), rr.rtype_with_data.rtype()));
    }

    for rr in new {
        if !seen.contains(&(rr.name.clone(), rr.rtype_with_data.rtype())) {
            priority.push(rr);
        }
    }
}
