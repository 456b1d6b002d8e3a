//! Filter engine stage: the TXT pseudo-protocol short-circuit, then
//! delegation downstream, then inspection of the returned answer for
//! Firefox-canary, safe-search, safe-browsing/parental, and blocking-rule
//! rewrites.

use std::net::IpAddr;
use std::sync::atomic::Ordering;

use hickory_server::proto::rr::rdata::{A, AAAA, CNAME, SOA, TXT};
use hickory_server::proto::rr::{Name, RData, RecordType};
use hickory_server::proto::op::ResponseCode;

use crate::error::pipeline::PipelineError;
use crate::hashset::parse_probe_labels;
use crate::message::{Message, Question, RecordData};
use crate::pipeline::{querylog_stage, PipelineServices};
use crate::rules::{MatchResult, Rule, RuleEngine};

const FIREFOX_CANARY: &str = "use-application-dns.net";
const SINKHOLE_TTL: u32 = 300;

pub async fn serve(services: &PipelineServices, query: &Message) -> Result<Message, PipelineError> {
    let question = query.question.as_ref().ok_or(PipelineError::MalformedQuery)?;

    if let Some(reply) = try_probe_reply(services, query, question).await {
        return Ok(reply);
    }

    let mut response = querylog_stage::serve(services, query).await?;
    inspect_response(services, query, question, &mut response).await;
    Ok(response)
}

/// TXT probe short-circuit for the safe-browsing/parental hash services:
/// if the owner name ends in either service's configured suffix, answer
/// locally without ever touching upstream.
async fn try_probe_reply(services: &PipelineServices, query: &Message, question: &Question) -> Option<Message> {
    if question.qtype != RecordType::TXT {
        return None;
    }
    let full_name = question.name.to_ascii().to_ascii_lowercase();

    let (suffix, is_parental) = if services.safe_browsing_cfg.enabled
        && full_name.ends_with(&services.safe_browsing_cfg.probe_suffix.to_ascii_lowercase())
    {
        (services.safe_browsing_cfg.probe_suffix.clone(), false)
    } else if services.parental_cfg.enabled
        && full_name.ends_with(&services.parental_cfg.probe_suffix.to_ascii_lowercase())
    {
        (services.parental_cfg.probe_suffix.clone(), true)
    } else {
        return None;
    };

    let prefix_part = full_name.strip_suffix(&suffix.to_ascii_lowercase())?.trim_end_matches('.');
    let labels = parse_probe_labels(prefix_part);
    if labels.is_empty() {
        return None;
    }

    let mut hashes: Vec<String> = if is_parental {
        let service = services.parental.read().await;
        labels.iter().flat_map(|l| service.match_hashes(l)).collect()
    } else {
        let service = services.safe_browsing.read().await;
        labels.iter().flat_map(|l| service.match_hashes(l)).collect()
    };
    hashes.sort();
    hashes.dedup();

    Some(txt_reply(query, hashes))
}

fn txt_reply(query: &Message, hashes: Vec<String>) -> Message {
    let mut reply = Message::empty_reply(query, ResponseCode::NoError);
    if let Some(question) = &query.question {
        reply.answers.push(RecordData {
            name: question.name.clone(),
            rtype: RecordType::TXT,
            rclass: question.qclass,
            ttl: 0,
            rdata: RData::TXT(TXT::new(hashes)),
        });
    }
    reply
}

/// Post-upstream inspection, checked in a fixed order: canary domain, then
/// safe-search, then safe-browsing/parental, then the blocking rule engine
/// against the question name and every CNAME/A/AAAA answer record.
async fn inspect_response(
    services: &PipelineServices,
    original_query: &Message,
    question: &Question,
    response: &mut Message,
) {
    let host = question.host_key();

    if host.eq_ignore_ascii_case(FIREFOX_CANARY) {
        *response = firefox_canary_reply(original_query);
        return;
    }

    if services.safe_search_cfg.enabled {
        if let Some(replacement) = services.safe_search.replacement_for(&host) {
            if let Some(reply) = safe_search_reply(services, original_query, question, replacement).await {
                services.metrics.safe_search_rewritten_total.fetch_add(1, Ordering::Relaxed);
                *response = reply;
                return;
            }
        }
    }

    if services.safe_browsing_cfg.enabled && services.safe_browsing.read().await.match_host(&host) {
        if let Some(reply) =
            sinkhole_reply(services, original_query, question, &services.safe_browsing_cfg.sinkhole_host).await
        {
            *response = reply;
            return;
        }
    }
    if services.parental_cfg.enabled && services.parental.read().await.match_host(&host) {
        if let Some(reply) =
            sinkhole_reply(services, original_query, question, &services.parental_cfg.sinkhole_host).await
        {
            *response = reply;
            return;
        }
    }

    let rules = services.rules.read().await;
    match rules.match_host(&host) {
        MatchResult::Whitelist(_) => {}
        MatchResult::Block(rule) => {
            services.metrics.blocked_total.fetch_add(1, Ordering::Relaxed);
            services.rule_hits.record(&rule);
            *response = null_reply(original_query, question);
        }
        MatchResult::Hosts { rule, ips } => {
            services.rule_hits.record(&rule);
            *response = hosts_reply(original_query, question, &ips);
        }
        MatchResult::None => {
            if let Some(rule) = matching_answer_rule(&rules, response) {
                services.metrics.blocked_total.fetch_add(1, Ordering::Relaxed);
                services.rule_hits.record(&rule);
                *response = null_reply(original_query, question);
            }
        }
    }
}

/// Re-matches the CNAME chain against the blocking engine: a CNAME
/// record's *target* is the newly introduced alias and is what gets
/// matched, while an A/AAAA record's rdata is an address the rule engine
/// can't key on, so its *owner name* (the last alias in the chain) is
/// matched instead. A whitelist hit anywhere in the chain suppresses the
/// block.
fn matching_answer_rule(rules: &RuleEngine, response: &Message) -> Option<Rule> {
    for record in &response.answers {
        let host = match &record.rdata {
            RData::CNAME(CNAME(target)) => target.to_ascii().to_ascii_lowercase(),
            RData::A(_) | RData::AAAA(_) => record.name.to_ascii().to_ascii_lowercase(),
            _ => continue,
        };
        match rules.match_host(&host) {
            MatchResult::Whitelist(_) => return None,
            MatchResult::Block(rule) => return Some(rule),
            MatchResult::Hosts { rule, .. } => return Some(rule),
            MatchResult::None => continue,
        }
    }
    None
}

/// `A=0.0.0.0` or `AAAA=::` for the question's own type, NXDOMAIN for any
/// other type.
fn null_reply(query: &Message, question: &Question) -> Message {
    let mut reply = Message::empty_reply(query, ResponseCode::NoError);
    match question.qtype {
        RecordType::A => reply.answers.push(RecordData {
            name: question.name.clone(),
            rtype: RecordType::A,
            rclass: question.qclass,
            ttl: 0,
            rdata: RData::A(A(std::net::Ipv4Addr::UNSPECIFIED)),
        }),
        RecordType::AAAA => reply.answers.push(RecordData {
            name: question.name.clone(),
            rtype: RecordType::AAAA,
            rclass: question.qclass,
            ttl: 0,
            rdata: RData::AAAA(AAAA(std::net::Ipv6Addr::UNSPECIFIED)),
        }),
        _ => reply.response_code = ResponseCode::NXDomain,
    }
    reply
}

/// Hosts-file rule reply: answers with whichever configured IPs match the
/// question's address family, NXDOMAIN if none do.
fn hosts_reply(query: &Message, question: &Question, ips: &[IpAddr]) -> Message {
    let mut reply = Message::empty_reply(query, ResponseCode::NoError);
    let matching: Vec<IpAddr> = ips
        .iter()
        .copied()
        .filter(|ip| matches!((question.qtype, *ip), (RecordType::A, IpAddr::V4(_)) | (RecordType::AAAA, IpAddr::V6(_))))
        .collect();

    if matching.is_empty() {
        reply.response_code = ResponseCode::NXDomain;
        return reply;
    }

    for ip in matching {
        let rdata = match ip {
            IpAddr::V4(v4) => RData::A(A(v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
        };
        reply.answers.push(RecordData { name: question.name.clone(), rtype: question.qtype, rclass: question.qclass, ttl: 0, rdata });
    }
    reply
}

fn firefox_canary_reply(query: &Message) -> Message {
    let mut reply = Message::empty_reply(query, ResponseCode::NXDomain);
    let Some(question) = &query.question else { return reply };

    let soa = SOA::new(
        Name::from_ascii("ns.dnsward.invalid.").unwrap(),
        Name::from_ascii("hostmaster.dnsward.invalid.").unwrap(),
        1,
        3600,
        600,
        86400,
        60,
    );
    reply.name_servers.push(RecordData {
        name: question.name.clone(),
        rtype: RecordType::SOA,
        rclass: question.qclass,
        ttl: 60,
        rdata: RData::SOA(soa),
    });
    reply
}

async fn resolve_ips(services: &PipelineServices, host: &str, qtype: RecordType) -> Option<Vec<IpAddr>> {
    let lookup = services.resolver.lookup_ip(host).await.ok()?;
    Some(
        lookup
            .iter()
            .filter(|ip| matches!((qtype, *ip), (RecordType::A, IpAddr::V4(_)) | (RecordType::AAAA, IpAddr::V6(_))))
            .collect(),
    )
}

async fn safe_search_reply(
    services: &PipelineServices,
    query: &Message,
    question: &Question,
    replacement_host: &str,
) -> Option<Message> {
    let ips = resolve_ips(services, replacement_host, question.qtype).await?;
    if ips.is_empty() {
        return None;
    }
    let mut reply = Message::empty_reply(query, ResponseCode::NoError);
    for ip in ips {
        let rdata = match ip {
            IpAddr::V4(v4) => RData::A(A(v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
        };
        reply.answers.push(RecordData {
            name: question.name.clone(),
            rtype: question.qtype,
            rclass: question.qclass,
            ttl: services.safe_search_cfg.blocked_ttl,
            rdata,
        });
    }
    Some(reply)
}

async fn sinkhole_reply(
    services: &PipelineServices,
    query: &Message,
    question: &Question,
    sinkhole_host: &str,
) -> Option<Message> {
    let ips = resolve_ips(services, sinkhole_host, question.qtype).await?;
    if ips.is_empty() {
        return None;
    }
    let cname_name = Name::from_ascii(sinkhole_host).ok()?;
    let mut reply = Message::empty_reply(query, ResponseCode::NoError);
    reply.answers.push(RecordData {
        name: question.name.clone(),
        rtype: RecordType::CNAME,
        rclass: question.qclass,
        ttl: SINKHOLE_TTL,
        rdata: RData::CNAME(CNAME(cname_name.clone())),
    });
    for ip in ips {
        let rdata = match ip {
            IpAddr::V4(v4) => RData::A(A(v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
        };
        reply.answers.push(RecordData { name: cname_name.clone(), rtype: question.qtype, rclass: question.qclass, ttl: SINKHOLE_TTL, rdata });
    }
    Some(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode};
    use hickory_server::proto::rr::DNSClass;
    use std::str::FromStr;

    fn query(qtype: RecordType, name: &str) -> Message {
        Message {
            id: 1,
            op_code: OpCode::Query,
            message_type: MessageType::Query,
            response_code: ResponseCode::NoError,
            truncated: false,
            authoritative: false,
            recursion_desired: true,
            recursion_available: false,
            authentic_data: false,
            checking_disabled: false,
            question: Some(Question { name: Name::from_str(name).unwrap(), qtype, qclass: DNSClass::IN }),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    #[test]
    fn null_reply_zeroes_a_record_with_zero_ttl() {
        let q = query(RecordType::A, "doubleclick.net.");
        let reply = null_reply(&q, q.question.as_ref().unwrap());
        assert_eq!(reply.response_code, ResponseCode::NoError);
        assert_eq!(reply.answers.len(), 1);
        assert_eq!(reply.answers[0].ttl, 0);
        assert!(matches!(reply.answers[0].rdata, RData::A(A(ip)) if ip == std::net::Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn null_reply_for_non_address_type_is_nxdomain() {
        let q = query(RecordType::TXT, "doubleclick.net.");
        let reply = null_reply(&q, q.question.as_ref().unwrap());
        assert_eq!(reply.response_code, ResponseCode::NXDomain);
        assert!(reply.answers.is_empty());
    }

    #[test]
    fn hosts_reply_filters_by_address_family() {
        let q = query(RecordType::A, "ads.example.org.");
        let ips = vec!["198.51.100.5".parse().unwrap(), "::1".parse().unwrap()];
        let reply = hosts_reply(&q, q.question.as_ref().unwrap(), &ips);
        assert_eq!(reply.answers.len(), 1);
        assert!(matches!(reply.answers[0].rdata, RData::A(_)));
    }

    #[test]
    fn hosts_reply_is_nxdomain_when_no_family_matches() {
        let q = query(RecordType::AAAA, "ads.example.org.");
        let ips = vec!["198.51.100.5".parse().unwrap()];
        let reply = hosts_reply(&q, q.question.as_ref().unwrap(), &ips);
        assert_eq!(reply.response_code, ResponseCode::NXDomain);
    }

    #[test]
    fn firefox_canary_reply_is_nxdomain_with_soa() {
        let q = query(RecordType::A, "use-application-dns.net.");
        let reply = firefox_canary_reply(&q);
        assert_eq!(reply.response_code, ResponseCode::NXDomain);
        assert_eq!(reply.name_servers.len(), 1);
        assert_eq!(reply.name_servers[0].rtype, RecordType::SOA);
    }

    #[tokio::test]
    async fn blocked_question_name_is_rewritten_to_null_reply() {
        let services = crate::pipeline::test_support::services();
        {
            let mut rules = services.rules.write().await;
            *rules = RuleEngine::builder().load_str(1, "||doubleclick.net^\n").build();
        }
        let q = query(RecordType::A, "doubleclick.net.");
        let question = q.question.clone().unwrap();
        let mut upstream_reply = q.clone();
        upstream_reply.answers.push(crate::message::RecordData {
            name: question.name.clone(),
            rtype: RecordType::A,
            rclass: hickory_server::proto::rr::DNSClass::IN,
            ttl: 300,
            rdata: RData::A(A(std::net::Ipv4Addr::new(93, 184, 216, 34))),
        });

        inspect_response(&services, &q, &question, &mut upstream_reply).await;
        assert_eq!(upstream_reply.response_code, ResponseCode::NoError);
        assert_eq!(upstream_reply.answers[0].ttl, 0);
        assert!(matches!(upstream_reply.answers[0].rdata, RData::A(A(ip)) if ip == std::net::Ipv4Addr::UNSPECIFIED));
    }

    #[tokio::test]
    async fn upstream_cname_into_blocked_domain_is_rewritten() {
        let services = crate::pipeline::test_support::services();
        {
            let mut rules = services.rules.write().await;
            *rules = RuleEngine::builder().load_str(1, "||doubleclick.net^\n").build();
        }
        let q = query(RecordType::A, "ads.example.com.");
        let question = q.question.clone().unwrap();
        let mut upstream_reply = q.clone();
        upstream_reply.answers.push(crate::message::RecordData {
            name: Name::from_str("ads.example.com.").unwrap(),
            rtype: RecordType::CNAME,
            rclass: hickory_server::proto::rr::DNSClass::IN,
            ttl: 300,
            rdata: RData::CNAME(CNAME(Name::from_str("track.doubleclick.net.").unwrap())),
        });

        inspect_response(&services, &q, &question, &mut upstream_reply).await;
        assert_eq!(upstream_reply.answers.len(), 1);
        assert_eq!(upstream_reply.answers[0].ttl, 0);
    }

    #[tokio::test]
    async fn txt_probe_suffix_answers_without_touching_downstream() {
        use sha2::{Digest, Sha256};

        let host = "testsb.example.org";
        let service = crate::hashset::HashService::builder().load_str(host).build();
        let cfg = crate::config::HashListConfig { enabled: true, ..crate::config::HashListConfig::default() };
        let services = crate::pipeline::test_support::services_with_safe_browsing(cfg, service);

        let mut hasher = Sha256::new();
        hasher.update(host.as_bytes());
        let digest_hex = hex::encode(hasher.finalize());
        let prefix = &digest_hex[..4];
        let name = format!("{prefix}.sb.dns.example.net.");

        let q = query(RecordType::TXT, &name);
        let reply = serve(&services, &q).await.unwrap();
        assert_eq!(reply.answers.len(), 1);
        assert!(matches!(&reply.answers[0].rdata, RData::TXT(_)));
    }
}
