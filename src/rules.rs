//! Domain/network rule engine plus hosts-file rules.
//!
//! Two rule shapes are supported, mirroring the adblock-style syntax AdGuard
//! rule lists use and the classic `/etc/hosts` format:
//!
//!   - `||domain^` blocks `domain` and every subdomain of it.
//!   - `@@||domain^` whitelists `domain` and every subdomain of it,
//!     overriding any block rule matched at the same or a less specific
//!     level.
//!   - a bare `domain` line is shorthand for `||domain^`.
//!   - `<ip> <domain>` is a hosts-file rule: queries for `domain` are
//!     answered with `ip` (A or AAAA depending on family) instead of the
//!     null-address block reply.
//!
//! Matching walks the query name from most to least specific label
//! (`a.b.example.com` → `b.example.com` → `example.com` → `com`), so a
//! rule for `example.com` also matches `www.example.com`.

use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Rule {
    pub list_id: u32,
    pub text: String,
}

/// Per-rule-text hit counter, drained and uploaded on a timer by the
/// caller. Keyed by `(list_id, rule_text)` so identical rule text in two
/// different lists is tracked separately.
#[derive(Debug, Default)]
pub struct RuleHitCounter {
    counts: std::sync::Mutex<HashMap<(u32, String), u64>>,
}

impl RuleHitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, rule: &Rule) {
        let mut counts = self.counts.lock().unwrap();
        *counts.entry((rule.list_id, rule.text.clone())).or_insert(0) += 1;
    }

    /// Drain every count, leaving the counter empty. Callers serialize the
    /// result as `{"filters":{<listId>:{<ruleText>:<count>}}}` for upload.
    pub fn drain(&self) -> HashMap<(u32, String), u64> {
        std::mem::take(&mut *self.counts.lock().unwrap())
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Block(Rule),
    Whitelist(Rule),
    Hosts { rule: Rule, ips: Vec<IpAddr> },
}

/// Outcome of a [`RuleEngine::match_host`] lookup.
#[derive(Debug, Clone)]
pub enum MatchResult {
    None,
    Whitelist(Rule),
    Block(Rule),
    Hosts { rule: Rule, ips: Vec<IpAddr> },
}

/// An indexed, immutable set of rules, replaced atomically on refresh and
/// never mutated in place. Built once from source files, then matched
/// against concurrently without locking.
#[derive(Debug, Default)]
pub struct RuleEngine {
    by_domain: HashMap<String, Entry>,
}

impl RuleEngine {
    pub fn builder() -> RuleEngineBuilder {
        RuleEngineBuilder::default()
    }

    /// Walk ancestor labels from most to least specific. A whitelist match
    /// at any level wins outright; otherwise the most specific block/hosts
    /// match wins.
    pub fn match_host(&self, host: &str) -> MatchResult {
        let host = host.trim_end_matches('.');
        if host.is_empty() {
            return MatchResult::None;
        }

        let mut block_candidate: Option<Rule> = None;
        let mut hosts_candidate: Option<(Rule, Vec<IpAddr>)> = None;

        for suffix in suffixes(host) {
            match self.by_domain.get(suffix) {
                Some(Entry::Whitelist(rule)) => return MatchResult::Whitelist(rule.clone()),
                Some(Entry::Block(rule)) => {
                    if block_candidate.is_none() {
                        block_candidate = Some(rule.clone());
                    }
                }
                Some(Entry::Hosts { rule, ips }) => {
                    if hosts_candidate.is_none() {
                        hosts_candidate = Some((rule.clone(), ips.clone()));
                    }
                }
                None => {}
            }
        }

        if let Some((rule, ips)) = hosts_candidate {
            return MatchResult::Hosts { rule, ips };
        }
        if let Some(rule) = block_candidate {
            return MatchResult::Block(rule);
        }
        MatchResult::None
    }

    pub fn rule_count(&self) -> usize {
        self.by_domain.len()
    }
}

/// Yields `host`, then each shorter dot-delimited suffix, most specific
/// first: `"a.b.example.com"` → `["a.b.example.com", "b.example.com",
/// "example.com", "com"]`.
fn suffixes(host: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(host);
    std::iter::from_fn(move || {
        let cur = rest?;
        rest = cur.split_once('.').map(|(_, tail)| tail);
        Some(cur)
    })
}

#[derive(Default)]
pub struct RuleEngineBuilder {
    by_domain: HashMap<String, Entry>,
}

impl RuleEngineBuilder {
    /// Parse one filter-list file's contents: UTF-8 text, blank lines and
    /// `#`-comment lines skipped.
    pub fn load_str(mut self, list_id: u32, contents: &str) -> Self {
        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.load_line(list_id, line);
        }
        self
    }

    fn load_line(&mut self, list_id: u32, line: &str) {
        if let Some(domain) = line.strip_prefix("@@||").and_then(|s| s.strip_suffix('^')) {
            self.insert(domain, Entry::Whitelist(Rule { list_id, text: line.to_string() }));
            return;
        }
        if let Some(domain) = line.strip_prefix("||").and_then(|s| s.strip_suffix('^')) {
            self.insert(domain, Entry::Block(Rule { list_id, text: line.to_string() }));
            return;
        }

        // Hosts-file syntax: "<ip> <domain> [# comment]".
        let mut parts = line.split_whitespace();
        if let (Some(ip_str), Some(domain)) = (parts.next(), parts.next()) {
            if let Ok(ip) = ip_str.parse::<IpAddr>() {
                self.insert_hosts(domain, ip, list_id, line);
                return;
            }
        }

        // Bare domain line: shorthand for a block rule on the domain and
        // all of its subdomains.
        self.insert(line, Entry::Block(Rule { list_id, text: line.to_string() }));
    }

    fn insert(&mut self, domain: &str, entry: Entry) {
        let key = domain.trim_end_matches('.').to_ascii_lowercase();
        if key.is_empty() {
            return;
        }
        self.by_domain.insert(key, entry);
    }

    fn insert_hosts(&mut self, domain: &str, ip: IpAddr, list_id: u32, text: &str) {
        let key = domain.trim_end_matches('.').to_ascii_lowercase();
        if key.is_empty() {
            return;
        }
        match self.by_domain.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut occ) => {
                if let Entry::Hosts { ips, .. } = occ.get_mut() {
                    if !ips.contains(&ip) {
                        ips.push(ip);
                    }
                    return;
                }
                occ.insert(Entry::Hosts { rule: Rule { list_id, text: text.to_string() }, ips: vec![ip] });
            }
            std::collections::hash_map::Entry::Vacant(vac) => {
                vac.insert(Entry::Hosts { rule: Rule { list_id, text: text.to_string() }, ips: vec![ip] });
            }
        }
    }

    pub fn build(self) -> RuleEngine {
        RuleEngine { by_domain: self.by_domain }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_rule_matches_domain_and_its_subdomains() {
        let engine = RuleEngine::builder().load_str(1, "||doubleclick.net^\n").build();
        match engine.match_host("doubleclick.net.") {
            MatchResult::Block(rule) => assert_eq!(rule.list_id, 1),
            other => panic!("expected block, got {other:?}"),
        }
        match engine.match_host("ads.doubleclick.net") {
            MatchResult::Block(_) => {}
            other => panic!("expected block for subdomain, got {other:?}"),
        }
    }

    #[test]
    fn whitelist_overrides_block_at_any_level() {
        let engine = RuleEngine::builder()
            .load_str(1, "||example.com^\n@@||safe.example.com^\n")
            .build();
        match engine.match_host("safe.example.com") {
            MatchResult::Whitelist(_) => {}
            other => panic!("expected whitelist, got {other:?}"),
        }
        match engine.match_host("ads.example.com") {
            MatchResult::Block(_) => {}
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn hosts_rule_returns_configured_ips() {
        let engine = RuleEngine::builder()
            .load_str(1, "0.0.0.0 ads.example.org\n::1 ads.example.org\n")
            .build();
        match engine.match_host("ads.example.org") {
            MatchResult::Hosts { ips, .. } => assert_eq!(ips.len(), 2),
            other => panic!("expected hosts match, got {other:?}"),
        }
    }

    #[test]
    fn comments_and_blank_lines_skipped() {
        let engine = RuleEngine::builder()
            .load_str(1, "# comment\n\n   \n||blocked.test^\n")
            .build();
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn unrelated_domain_does_not_match() {
        let engine = RuleEngine::builder().load_str(1, "||blocked.test^\n").build();
        assert!(matches!(engine.match_host("example.com"), MatchResult::None));
    }

    #[test]
    fn rule_hit_counter_tracks_same_text_across_lists_separately() {
        let counter = RuleHitCounter::new();
        let a = Rule { list_id: 1, text: "||ads.test^".to_string() };
        let b = Rule { list_id: 2, text: "||ads.test^".to_string() };
        counter.record(&a);
        counter.record(&a);
        counter.record(&b);
        let drained = counter.drain();
        assert_eq!(drained[&(1, "||ads.test^".to_string())], 2);
        assert_eq!(drained[&(2, "||ads.test^".to_string())], 1);
        assert!(counter.drain().is_empty());
    }
}
