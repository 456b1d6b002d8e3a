//! Process configuration.
//!
//! This is the minimal ambient layer every component in this crate is
//! constructed from: a `serde`-deserializable shape loaded from an optional
//! YAML file and overridden by `clap` CLI flags.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::app::AppError;

/// Expand a leading `~` in a configured path to the user's home directory,
/// leaving every other path untouched.
pub fn expand_path(path: &std::path::Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[derive(Debug, Clone, clap::Parser)]
#[command(version, about = "A filtering recursive DNS server")]
pub struct Cli {
    /// Path to a YAML configuration file. Fields present in the file
    /// override the built-in defaults; absent fields keep the default.
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<PathBuf>,

    /// Override the DNS listen address from the config file.
    #[arg(long = "listen")]
    pub listen: Option<SocketAddr>,

    /// Override the admin HTTP listen address from the config file.
    #[arg(long = "admin-listen")]
    pub admin_listen: Option<SocketAddr>,
}

impl Cli {
    /// Load a [`ServerConfig`], starting from defaults, applying the
    /// optional YAML file, then applying CLI overrides.
    pub fn load(&self) -> Result<ServerConfig, AppError> {
        let mut config = match &self.config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(expand_path(path))?;
                serde_yaml::from_str::<ServerConfig>(&raw)?
            }
            None => ServerConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(admin_listen) = self.admin_listen {
            config.query_log.admin_listen = admin_listen;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamGroupConfig {
    pub primary: SocketAddr,
    pub fallbacks: Vec<SocketAddr>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub health_check_interval: Option<Duration>,
    pub health_check_template: String,
    pub health_check_backoff: Duration,
}

impl Default for UpstreamGroupConfig {
    fn default() -> Self {
        Self {
            primary: SocketAddr::from(([1, 1, 1, 1], 53)),
            fallbacks: vec![SocketAddr::from(([8, 8, 8, 8], 53))],
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
            health_check_interval: None,
            health_check_template: "__dnsward_health_check__.example.".to_string(),
            health_check_backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub rps: u32,
    pub backoff_limit: u32,
    pub default_response_size: u32,
    pub allowlist: Vec<IpAddr>,
    pub allowlist_url: Option<String>,
    pub allowlist_refresh: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rps: 30,
            backoff_limit: 30,
            default_response_size: 1000,
            allowlist: Vec::new(),
            allowlist_url: None,
            allowlist_refresh: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterListConfig {
    pub id: u32,
    pub path: PathBuf,
    pub url: Option<String>,
    #[serde(default = "default_update_check_period")]
    pub update_check_period: Duration,
}

fn default_update_check_period() -> Duration {
    Duration::from_secs(600)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeSearchConfig {
    pub enabled: bool,
    pub blocked_ttl: u32,
}

impl Default for SafeSearchConfig {
    fn default() -> Self {
        Self { enabled: false, blocked_ttl: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashListConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    pub sinkhole_host: String,
    pub legacy_four_byte_prefix: bool,
    /// Owner-name suffix the TXT probe protocol matches against, e.g.
    /// `sb.dns.example.net.`; the hex-prefix labels precede this suffix.
    pub probe_suffix: String,
}

impl Default for HashListConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            url: None,
            sinkhole_host: "sinkhole.dnsward.invalid".to_string(),
            legacy_four_byte_prefix: false,
            probe_suffix: "sb.dns.example.net.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternateRule {
    pub rcode: String,
    pub address: SocketAddr,
    #[serde(default)]
    pub original: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDbConfig {
    /// Filesystem cache path. A value of exactly `"none"` disables the
    /// cache entirely; any other path must end in `.pb`.
    pub cache_path: String,
    pub full_sync_interval: Duration,
    pub full_sync_retry_interval: Duration,
}

impl Default for ProfileDbConfig {
    fn default() -> Self {
        Self {
            cache_path: "none".to_string(),
            full_sync_interval: Duration::from_secs(3600),
            full_sync_retry_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLogConfig {
    pub admin_listen: SocketAddr,
    pub buffer_rotation_period: Duration,
}

impl Default for QueryLogConfig {
    fn default() -> Self {
        Self {
            admin_listen: SocketAddr::from(([127, 0, 0, 1], 8853)),
            buffer_rotation_period: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub session_ticket_rotation: Duration,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self { session_ticket_rotation: Duration::from_secs(3600) }
    }
}

/// Periodic upload of the rule-hit counter to an external collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub rule_hit_upload_url: Option<String>,
    pub upload_period: Duration,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self { rule_hit_upload_url: None, upload_period: Duration::from_secs(600) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub upstream: UpstreamGroupConfig,
    pub rate_limit: RateLimitConfig,
    pub filter_lists: Vec<FilterListConfig>,
    pub safe_search: SafeSearchConfig,
    pub safe_browsing: HashListConfig,
    pub parental: HashListConfig,
    pub cache: CacheConfig,
    pub alternates: Vec<AlternateRule>,
    pub profile_db: ProfileDbConfig,
    pub query_log: QueryLogConfig,
    pub tls: TlsConfig,
    pub reporting: ReportingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 53)),
            upstream: UpstreamGroupConfig::default(),
            rate_limit: RateLimitConfig::default(),
            filter_lists: Vec::new(),
            safe_search: SafeSearchConfig::default(),
            safe_browsing: HashListConfig::default(),
            parental: HashListConfig { probe_suffix: "pc.dns.example.net.".to_string(), ..HashListConfig::default() },
            cache: CacheConfig::default(),
            alternates: Vec::new(),
            profile_db: ProfileDbConfig::default(),
            query_log: QueryLogConfig::default(),
            tls: TlsConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Startup-time validation: rcode uniqueness among alternate rules,
    /// and profile-DB cache path extension.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.alternates {
            if !seen.insert(rule.rcode.to_ascii_uppercase()) {
                return Err(AppError::Malformed(format!(
                    "duplicate alternate rule for rcode {}",
                    rule.rcode
                )));
            }
        }

        if self.profile_db.cache_path != "none" && !self.profile_db.cache_path.ends_with(".pb") {
            return Err(AppError::Malformed(format!(
                "profile_db.cache_path must end in .pb or be \"none\", got {}",
                self.profile_db.cache_path
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        ServerConfig::default().validate().unwrap();
    }

    #[test]
    fn expand_path_leaves_absolute_paths_untouched() {
        let path = PathBuf::from("/etc/dnsward/filters/ads.list");
        assert_eq!(expand_path(&path), path);
    }

    #[test]
    fn expand_path_resolves_leading_tilde() {
        let expanded = expand_path(&PathBuf::from("~/filters/ads.list"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn duplicate_alternate_rcode_rejected() {
        let mut cfg = ServerConfig::default();
        cfg.alternates.push(AlternateRule {
            rcode: "SERVFAIL".into(),
            address: "192.0.2.1:53".parse().unwrap(),
            original: false,
        });
        cfg.alternates.push(AlternateRule {
            rcode: "servfail".into(),
            address: "192.0.2.2:53".parse().unwrap(),
            original: false,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_cache_path_extension_rejected() {
        let mut cfg = ServerConfig::default();
        cfg.profile_db.cache_path = "profiles.json".to_string();
        assert!(cfg.validate().is_err());
    }
}
