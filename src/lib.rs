#![doc = "Core library for the `dnsward` filtering DNS server.\n\nThis crate implements the request pipeline and supporting state engines of a\nrecursive-style filtering resolver: per-IP rate limiting, rule-list and\nhash-prefix filtering, safe-search rewriting, a TTL-aware response cache,\nan upstream client with UDP/TCP fallback and health checking, a profile\ndatabase refreshed from an external control plane, an alternate-upstream\ndispatcher, and a minimal TLS certificate index for encrypted transports.\n\nWire decoding, listener lifecycle, TLS handshakes, configuration-file\ngrammar and metrics exposition are treated as external collaborators; only\nthe interfaces this crate depends on are modeled.\n"]

/// Process configuration: the shape every other component is built from.
pub mod config;
/// Error types shared across the pipeline, storage, and admin HTTP layers.
pub mod error;
/// Typed DNS message model built on top of `hickory-proto`.
pub mod message;

/// Per-IP token-bucket rate limiter with strike-based back-off.
pub mod ratelimit;
/// Domain/network rule engine plus hosts-file rules.
pub mod rules;
/// Sorted hash-prefix service backing safe-browsing/parental lists.
pub mod hashset;
/// Fixed safe-search substitution map.
pub mod safesearch;
/// TTL-aware LRU response cache.
pub mod cache;
/// Upstream connection pool, proxy, and primary/fallback group.
pub mod upstream;
/// Rcode-keyed alternate upstream dispatcher.
pub mod dispatcher;
/// In-memory profile/device database with refresh scheduling.
pub mod profiledb;
/// Query-log buffer (dnsdb-equivalent) and CSV dump support.
pub mod querylog;
/// Minimal TLS certificate index for custom-domain / encrypted transports.
pub mod tls;
/// In-memory counters and histograms observed by pipeline stages.
pub mod metrics;
/// The ordered request-handling pipeline.
pub mod pipeline;
/// Admin HTTP surface: query-log dump endpoint.
pub mod admin;
/// Outbound HTTP collaborators: filter-list, allowlist, and rule-hit-upload fetch/refresh.
pub mod fetch;
