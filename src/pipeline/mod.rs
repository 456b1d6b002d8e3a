//! The ordered request-handling pipeline.
//!
//! Stages are plain async functions rather than a dynamic handler list: the
//! canonical order (refuse-ANY → ratelimit → dnsfilter → response-recorder
//! → response-cache → upstream/alternate) is a hard invariant, not runtime
//! configuration, so each stage calls the next directly and hands back its
//! answer by return value.

mod alternate_stage;
mod cache_stage;
mod filter_stage;
mod querylog_stage;
mod refuse_any_stage;
mod upstream_stage;

use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use tokio::sync::RwLock;

use crate::cache::{response_wire_size, ResponseCache};
use crate::config::{HashListConfig, SafeSearchConfig};
use crate::dispatcher::AlternateDispatcher;
use crate::hashset::HashService;
use crate::message::Message;
use crate::metrics::Metrics;
use crate::querylog::QueryLogBuffer;
use crate::ratelimit::{Decision, RateLimiter};
use crate::rules::{RuleEngine, RuleHitCounter};
use crate::upstream::UpstreamGroup;

/// Per-query context a listener hands the pipeline; never carries anything
/// that outlives one query.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub source_ip: IpAddr,
    pub is_udp: bool,
}

pub type DnsResolver = Resolver<TokioConnectionProvider>;

/// The root-scoped service struct every handler is built from, per the
/// "prefer a root-scoped service struct over package-level globals"
/// guidance: one instance is constructed at startup and shared (via `Arc`)
/// across every connection the listener accepts.
pub struct PipelineServices {
    pub rate_limiter: Arc<RateLimiter>,
    pub rules: Arc<RwLock<RuleEngine>>,
    pub rule_hits: Arc<RuleHitCounter>,
    pub safe_search: Arc<crate::safesearch::SafeSearchMap>,
    pub safe_search_cfg: SafeSearchConfig,
    pub safe_browsing: Arc<RwLock<HashService>>,
    pub safe_browsing_cfg: HashListConfig,
    pub parental: Arc<RwLock<HashService>>,
    pub parental_cfg: HashListConfig,
    pub cache: Arc<ResponseCache>,
    pub upstream: Arc<UpstreamGroup>,
    pub alternates: Arc<AlternateDispatcher>,
    pub query_log: Arc<QueryLogBuffer>,
    pub metrics: Arc<Metrics>,
    pub resolver: Arc<DnsResolver>,
}

/// Top-level entrypoint a listener calls once per accepted query.
///
/// `None` means the pipeline decided to drop the query silently
/// (rate-limited or backed-off); every other outcome is a message the
/// listener must write back to the client.
pub struct Pipeline {
    services: Arc<PipelineServices>,
}

impl Pipeline {
    pub fn new(services: Arc<PipelineServices>) -> Self {
        Self { services }
    }

    pub async fn handle(&self, query: &Message, ctx: RequestContext) -> Option<Message> {
        let services = &self.services;
        services.metrics.queries_total.fetch_add(1, Ordering::Relaxed);

        if query.question.is_none() {
            return Some(Message::empty_reply(query, hickory_server::proto::op::ResponseCode::FormErr));
        }

        if let Some(refused) = refuse_any_stage::serve(services, query) {
            return Some(refused);
        }

        if ctx.is_udp {
            match services.rate_limiter.check(ctx.source_ip, Instant::now()) {
                Decision::Allow => {}
                Decision::RateLimited => {
                    services.metrics.rate_limited_total.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Decision::BackedOff => {
                    services.metrics.backed_off_total.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let response = match filter_stage::serve(services, query).await {
            Ok(response) => response,
            Err(err) => Message::empty_reply(query, err.rcode()),
        };

        if ctx.is_udp {
            let size = response_wire_size(&response);
            services.rate_limiter.charge_response_size(ctx.source_ip, size, Instant::now());
        }

        Some(response)
    }
}

/// Shared test fixtures for every `pipeline::*_stage` submodule's tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::time::Duration;

    /// A `PipelineServices` wired from defaults with no real upstream
    /// reachable; stages that need to reach `services.upstream` must use a
    /// short timeout and expect `UpstreamError`.
    pub fn services() -> Arc<PipelineServices> {
        let resolver_config = hickory_resolver::config::ResolverConfig::default();
        let resolver_opts = hickory_resolver::config::ResolverOpts::default();
        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(resolver_opts)
                .build();

        Arc::new(PipelineServices {
            rate_limiter: Arc::new(RateLimiter::new(100, 30, 1000, vec![])),
            rules: Arc::new(RwLock::new(RuleEngine::default())),
            rule_hits: Arc::new(RuleHitCounter::new()),
            safe_search: Arc::new(crate::safesearch::SafeSearchMap::default()),
            safe_search_cfg: SafeSearchConfig::default(),
            safe_browsing: Arc::new(RwLock::new(HashService::default())),
            safe_browsing_cfg: HashListConfig::default(),
            parental: Arc::new(RwLock::new(HashService::default())),
            parental_cfg: HashListConfig::default(),
            cache: Arc::new(ResponseCache::new(100)),
            upstream: Arc::new(UpstreamGroup::new(&crate::config::UpstreamGroupConfig {
                primary: "127.0.0.1:1".parse().unwrap(),
                fallbacks: vec![],
                connect_timeout: Duration::from_millis(50),
                read_timeout: Duration::from_millis(50),
                health_check_interval: None,
                health_check_template: "__TOKEN__.health.invalid.".to_string(),
                health_check_backoff: Duration::from_secs(1),
            })),
            alternates: Arc::new(AlternateDispatcher::build(&[]).unwrap()),
            query_log: Arc::new(QueryLogBuffer::new()),
            metrics: Arc::new(Metrics::new()),
            resolver: Arc::new(resolver),
        })
    }

    /// Like [`services`], but with the safe-browsing hash service enabled
    /// and pre-loaded, for stages that need to exercise that path.
    pub fn services_with_safe_browsing(cfg: HashListConfig, service: HashService) -> Arc<PipelineServices> {
        let base = services();
        Arc::new(PipelineServices {
            rate_limiter: base.rate_limiter.clone(),
            rules: base.rules.clone(),
            rule_hits: base.rule_hits.clone(),
            safe_search: base.safe_search.clone(),
            safe_search_cfg: base.safe_search_cfg.clone(),
            safe_browsing: Arc::new(RwLock::new(service)),
            safe_browsing_cfg: cfg,
            parental: base.parental.clone(),
            parental_cfg: base.parental_cfg.clone(),
            cache: base.cache.clone(),
            upstream: base.upstream.clone(),
            alternates: base.alternates.clone(),
            query_log: base.query_log.clone(),
            metrics: base.metrics.clone(),
            resolver: base.resolver.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode, ResponseCode};
    use hickory_server::proto::rr::{DNSClass, Name, RecordType};
    use std::str::FromStr;

    fn query(qtype: RecordType, name: &str) -> Message {
        Message {
            id: 7,
            op_code: OpCode::Query,
            message_type: MessageType::Query,
            response_code: ResponseCode::NoError,
            truncated: false,
            authoritative: false,
            recursion_desired: true,
            recursion_available: false,
            authentic_data: false,
            checking_disabled: false,
            question: Some(crate::message::Question {
                name: Name::from_str(name).unwrap(),
                qtype,
                qclass: DNSClass::IN,
            }),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    #[tokio::test]
    async fn any_query_short_circuits_with_notimp_and_no_upstream_traffic() {
        let services = test_support::services();
        let pipeline = Pipeline::new(services);
        let q = query(RecordType::ANY, "example.com.");
        let reply = pipeline.handle(&q, RequestContext { source_ip: "127.0.0.1".parse().unwrap(), is_udp: true }).await.unwrap();
        assert_eq!(reply.response_code, ResponseCode::NotImp);
    }

    #[tokio::test]
    async fn missing_question_is_formerr() {
        let services = test_support::services();
        let pipeline = Pipeline::new(services);
        let mut q = query(RecordType::A, "example.com.");
        q.question = None;
        let reply = pipeline.handle(&q, RequestContext { source_ip: "127.0.0.1".parse().unwrap(), is_udp: true }).await.unwrap();
        assert_eq!(reply.response_code, ResponseCode::FormErr);
    }

    #[tokio::test]
    async fn rate_limited_udp_query_is_dropped_silently() {
        let services = test_support::services();
        let pipeline = Pipeline::new(services.clone());
        let ctx = RequestContext { source_ip: "198.51.100.1".parse().unwrap(), is_udp: true };
        for _ in 0..101 {
            services.rate_limiter.check(ctx.source_ip, Instant::now());
        }
        let q = query(RecordType::A, "example.com.");
        assert!(pipeline.handle(&q, ctx).await.is_none());
    }
}
