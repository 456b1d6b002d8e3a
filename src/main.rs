//! `dnswardd`: process entrypoint. Loads configuration, wires every
//! component in [`dnsward`] into one [`dnsward::pipeline::PipelineServices`],
//! and runs the DNS listeners (UDP + TCP) alongside the admin HTTP surface
//! and the background refresh tasks (filter lists, hash lists, rate-limit
//! allowlist, rule-hit upload, query-log rotation, upstream health checks).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use env_logger::Env;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::proto::op::Header;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{Mutex, RwLock};

use dnsward::cache::ResponseCache;
use dnsward::config::{expand_path, Cli, HashListConfig, ServerConfig};
use dnsward::dispatcher::AlternateDispatcher;
use dnsward::hashset::HashService;
use dnsward::message::Message;
use dnsward::metrics::Metrics;
use dnsward::pipeline::{Pipeline, PipelineServices, RequestContext};
use dnsward::querylog::{QueryLogBuffer, QueryLogStore};
use dnsward::ratelimit::RateLimiter;
use dnsward::rules::{RuleEngine, RuleHitCounter};
use dnsward::safesearch::SafeSearchMap;
use dnsward::upstream::UpstreamGroup;

/// Adapts `hickory-server`'s wire-level `Request`/`ResponseHandler` pair
/// onto [`Pipeline::handle`]: a thin `RequestHandler` impl that converts
/// the incoming request, calls through, and writes back whatever the
/// pipeline decided.
struct DnsHandler {
    pipeline: Pipeline,
}

#[async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(&self, request: &Request, response_handle: R) -> ResponseInfo {
        let query = message_from_request(request);
        let ctx = RequestContext {
            source_ip: request.src().ip(),
            is_udp: matches!(request.protocol(), hickory_server::proto::xfer::Protocol::Udp),
        };

        match self.pipeline.handle(&query, ctx).await {
            Some(reply) => send_response(request, response_handle, &reply).await,
            // Rate-limited/backed-off: the pipeline wants this query dropped
            // on the floor, so `send_response` is never called.
            None => ResponseInfo::from(*request.header()),
        }
    }
}

fn message_from_request(request: &Request) -> Message {
    let header = *request.header();
    let question = request.queries().first().map(|q| dnsward::message::Question {
        name: (*q.name()).clone().into(),
        qtype: q.query_type(),
        qclass: q.query_class(),
    });
    let edns = request.edns().map(|e| dnsward::message::EdnsInfo {
        dnssec_ok: e.flags().dnssec_ok,
        max_payload: e.max_payload(),
    });

    Message {
        id: header.id(),
        op_code: header.op_code(),
        message_type: header.message_type(),
        response_code: header.response_code(),
        truncated: false,
        authoritative: false,
        recursion_desired: header.recursion_desired(),
        recursion_available: false,
        authentic_data: header.authentic_data(),
        checking_disabled: header.checking_disabled(),
        question,
        answers: vec![],
        name_servers: vec![],
        additionals: vec![],
        edns,
    }
}

async fn send_response<R: ResponseHandler>(request: &Request, mut response_handle: R, reply: &Message) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_response_code(reply.response_code);
    header.set_authoritative(false);
    header.set_recursion_available(reply.recursion_available);
    header.set_authentic_data(reply.authentic_data);
    header.set_truncated(reply.truncated);

    let answers: Vec<_> = reply.answers.iter().map(|r| r.to_wire()).collect();
    let name_servers: Vec<_> = reply.name_servers.iter().map(|r| r.to_wire()).collect();
    let additionals: Vec<_> = reply.additionals.iter().map(|r| r.to_wire()).collect();

    let response = MessageResponseBuilder::from_message_request(request).build(
        header,
        answers.iter(),
        name_servers.iter(),
        &[],
        additionals.iter(),
    );

    response_handle.send_response(response).await.unwrap_or_else(|err| {
        log::error!("failed to send DNS response: {err}");
        ResponseInfo::from(header)
    })
}

/// Runs `fut` as a detached task; a panic inside it is caught, logged, and
/// terminates the process with a failure exit code rather than leaving a
/// half-dead background task running silently.
fn spawn_guarded<F>(name: &'static str, fut: F)
where
    F: std::future::Future<Output = ()> + 'static,
{
    let handle = actix_web::rt::spawn(fut);
    actix_web::rt::spawn(async move {
        if let Err(err) = handle.await {
            log::error!("detached task '{name}' panicked: {err}");
            std::process::exit(1);
        }
    });
}

fn load_rule_engine(config: &ServerConfig) -> RuleEngine {
    let mut builder = RuleEngine::builder();
    for list in &config.filter_lists {
        match std::fs::read_to_string(expand_path(&list.path)) {
            Ok(contents) => builder = builder.load_str(list.id, &contents),
            Err(err) => log::warn!("filter list {} ({}): {err}", list.id, list.path.display()),
        }
    }
    builder.build()
}

fn load_hash_service(config: &HashListConfig) -> HashService {
    if !config.enabled {
        return HashService::default();
    }
    let Some(path) = &config.path else { return HashService::default() };
    match std::fs::read_to_string(expand_path(path)) {
        Ok(contents) => HashService::builder().load_str(&contents).build(),
        Err(err) => {
            log::warn!("hash list ({}): {err}", path.display());
            HashService::default()
        }
    }
}

/// Periodically re-fetches every configured filter list from its URL and
/// atomically rewrites its on-disk file, then reloads and swaps in a fresh
/// `RuleEngine` built from every list's current contents.
async fn run_filter_list_refresh(config: Arc<ServerConfig>, rules: Arc<RwLock<RuleEngine>>, http: reqwest::Client) {
    let urled: Vec<_> = config.filter_lists.iter().filter(|l| l.url.is_some()).cloned().collect();
    if urled.is_empty() {
        return;
    }
    let period = urled.iter().map(|l| l.update_check_period).min().unwrap_or(Duration::from_secs(600));

    loop {
        tokio::time::sleep(period).await;
        let mut changed = false;
        for list in &urled {
            let url = list.url.as_ref().unwrap();
            match dnsward::fetch::fetch_list_to_file(&http, url, &expand_path(&list.path)).await {
                Ok(()) => changed = true,
                Err(err) => log::warn!("filter list {} refresh from {url} failed: {err}", list.id),
            }
        }
        if changed {
            let engine = load_rule_engine(&config);
            log::info!("reloaded rule engine with {} rules", engine.rule_count());
            *rules.write().await = engine;
        }
    }
}

/// Periodically re-fetches a single safe-browsing/parental hash list and
/// swaps in a freshly built `HashService`.
async fn run_hash_list_refresh(
    label: &'static str,
    config: HashListConfig,
    service: Arc<RwLock<HashService>>,
    http: reqwest::Client,
) {
    let (Some(url), Some(path)) = (config.url.clone(), config.path.clone()) else { return };
    loop {
        tokio::time::sleep(Duration::from_secs(600)).await;
        match dnsward::fetch::fetch_list_to_file(&http, &url, &expand_path(&path)).await {
            Ok(()) => {
                let reloaded = load_hash_service(&config);
                log::info!("reloaded {label} hash list with {} entries", reloaded.len());
                *service.write().await = reloaded;
            }
            Err(err) => log::warn!("{label} hash list refresh from {url} failed: {err}"),
        }
    }
}

async fn run_allowlist_refresh(config: Arc<ServerConfig>, rate_limiter: Arc<RateLimiter>, http: reqwest::Client) {
    let Some(url) = config.rate_limit.allowlist_url.clone() else { return };
    loop {
        tokio::time::sleep(config.rate_limit.allowlist_refresh).await;
        match dnsward::fetch::fetch_allowlist(&http, &url).await {
            Ok(ips) => {
                log::info!("refreshed rate-limit allowlist with {} entries", ips.len());
                rate_limiter.set_allowlist(ips);
            }
            Err(err) => log::warn!("allowlist refresh from {url} failed: {err}"),
        }
    }
}

async fn run_rule_hit_upload(config: Arc<ServerConfig>, rule_hits: Arc<RuleHitCounter>, http: reqwest::Client) {
    let Some(url) = config.reporting.rule_hit_upload_url.clone() else { return };
    loop {
        tokio::time::sleep(config.reporting.upload_period).await;
        let counts = rule_hits.drain();
        if counts.is_empty() {
            continue;
        }
        if let Err(err) = dnsward::fetch::upload_rule_hits(&http, &url, counts).await {
            log::warn!("rule-hit upload to {url} failed: {err}");
        }
    }
}

async fn run_query_log_rotation(period: Duration, buffer: Arc<QueryLogBuffer>, store: Arc<Mutex<QueryLogStore>>) {
    loop {
        tokio::time::sleep(period).await;
        store.lock().await.merge(buffer.drain());
    }
}

async fn run_health_checks(interval: Duration, upstream: Arc<UpstreamGroup>) {
    loop {
        tokio::time::sleep(interval).await;
        let token: u64 = rand::random();
        upstream.run_health_checks(&token.to_string()).await;
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let config = Arc::new(
        cli.load()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?,
    );

    let resolver_config = hickory_resolver::config::ResolverConfig::default();
    let resolver_opts = hickory_resolver::config::ResolverOpts::default();
    let resolver = Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
        .with_options(resolver_opts)
        .build();

    let rules = Arc::new(RwLock::new(load_rule_engine(&config)));
    let safe_browsing = Arc::new(RwLock::new(load_hash_service(&config.safe_browsing)));
    let parental = Arc::new(RwLock::new(load_hash_service(&config.parental)));

    let alternates = Arc::new(
        AlternateDispatcher::build(&config.alternates)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?,
    );

    let query_log = Arc::new(QueryLogBuffer::new());
    let query_log_store = Arc::new(Mutex::new(QueryLogStore::new()));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.rps,
        config.rate_limit.backoff_limit,
        config.rate_limit.default_response_size,
        config.rate_limit.allowlist.clone(),
    ));
    let upstream = Arc::new(UpstreamGroup::new(&config.upstream));

    let services = Arc::new(PipelineServices {
        rate_limiter: rate_limiter.clone(),
        rules: rules.clone(),
        rule_hits: Arc::new(RuleHitCounter::new()),
        safe_search: Arc::new(SafeSearchMap::default()),
        safe_search_cfg: config.safe_search.clone(),
        safe_browsing: safe_browsing.clone(),
        safe_browsing_cfg: config.safe_browsing.clone(),
        parental: parental.clone(),
        parental_cfg: config.parental.clone(),
        cache: Arc::new(ResponseCache::new(config.cache.capacity)),
        upstream: upstream.clone(),
        alternates,
        query_log: query_log.clone(),
        metrics: Arc::new(Metrics::new()),
        resolver: Arc::new(resolver),
    });

    let http = reqwest::Client::new();

    spawn_guarded(
        "filter-list-refresh",
        run_filter_list_refresh(config.clone(), rules, http.clone()),
    );
    spawn_guarded(
        "safe-browsing-refresh",
        run_hash_list_refresh("safe-browsing", config.safe_browsing.clone(), safe_browsing, http.clone()),
    );
    spawn_guarded(
        "parental-refresh",
        run_hash_list_refresh("parental", config.parental.clone(), parental, http.clone()),
    );
    spawn_guarded(
        "allowlist-refresh",
        run_allowlist_refresh(config.clone(), rate_limiter, http.clone()),
    );
    spawn_guarded(
        "rule-hit-upload",
        run_rule_hit_upload(config.clone(), services.rule_hits.clone(), http),
    );
    spawn_guarded(
        "query-log-rotation",
        run_query_log_rotation(config.query_log.buffer_rotation_period, query_log.clone(), query_log_store.clone()),
    );
    if let Some(interval) = config.upstream.health_check_interval {
        spawn_guarded("upstream-health-check", run_health_checks(interval, upstream));
    }

    let admin_listen: SocketAddr = config.query_log.admin_listen;
    spawn_guarded("admin-http", async move {
        if let Err(err) = dnsward::admin::serve(admin_listen, query_log, query_log_store).await {
            log::error!("admin HTTP surface failed: {err}");
        }
    });

    let pipeline = Pipeline::new(services);
    let handler = DnsHandler { pipeline };
    let mut dns_server = hickory_server::server::ServerFuture::new(handler);
    dns_server.register_socket(UdpSocket::bind(config.listen).await?);
    dns_server.register_listener(TcpListener::bind(config.listen).await?, Duration::from_secs(10));

    log::info!("dnswardd listening on {}", config.listen);
    dns_server
        .block_until_done()
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}
