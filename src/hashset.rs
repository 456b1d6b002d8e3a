//! Sorted hash-prefix service backing the safe-browsing/parental-control
//! lists.
//!
//! Each loaded hostname is hashed with SHA-256; the first two bytes become
//! the bucket key and the remaining 30 bytes are appended, sorted, to that
//! bucket's suffix list. A full hash is therefore always `prefix ++
//! suffix`, so no separate full-hash table is needed to answer the TXT
//! probe protocol.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

const SUFFIX_LEN: usize = 30;

fn hash_host(host: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(host.trim_end_matches('.').to_ascii_lowercase().as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Default)]
pub struct HashService {
    buckets: HashMap<u16, Vec<[u8; SUFFIX_LEN]>>,
}

impl HashService {
    pub fn builder() -> HashServiceBuilder {
        HashServiceBuilder::default()
    }

    /// True iff `SHA-256(host)` is present in the service.
    pub fn match_host(&self, host: &str) -> bool {
        let digest = hash_host(host);
        let prefix = u16::from_be_bytes([digest[0], digest[1]]);
        let suffix: [u8; SUFFIX_LEN] = digest[2..].try_into().unwrap();
        self.buckets
            .get(&prefix)
            .is_some_and(|suffixes| suffixes.binary_search(&suffix).is_ok())
    }

    /// Answer the TXT probe protocol: given the raw prefix bytes extracted
    /// from the query name (2 bytes normally, 4 in legacy mode), return
    /// every full SHA-256 hex digest in the service whose prefix matches.
    pub fn match_hashes(&self, prefix_bytes: &[u8]) -> Vec<String> {
        if prefix_bytes.len() < 2 {
            return Vec::new();
        }
        let bucket_key = u16::from_be_bytes([prefix_bytes[0], prefix_bytes[1]]);
        let Some(suffixes) = self.buckets.get(&bucket_key) else {
            return Vec::new();
        };

        suffixes
            .iter()
            .filter(|suffix| {
                // Legacy mode narrows the match with two more prefix bytes
                // taken from the start of the suffix.
                prefix_bytes.len() < 4 || suffix[..2] == prefix_bytes[2..4]
            })
            .map(|suffix| {
                let mut full = Vec::with_capacity(32);
                full.extend_from_slice(&bucket_key.to_be_bytes());
                full.extend_from_slice(suffix);
                hex::encode(full)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses the dot-separated run of 2-byte hex groups used by the TXT probe
/// protocol into a flat list of prefixes, one per requested group. Each
/// label is 4 hex characters (2 bytes); a trailing zone suffix
/// (e.g. `sb.dns.example.net`) is not part of this string and must already
/// be stripped by the caller.
pub fn parse_probe_labels(labels: &str) -> Vec<Vec<u8>> {
    labels
        .split('.')
        .filter(|l| !l.is_empty())
        .filter_map(|l| hex::decode(l).ok())
        .collect()
}

#[derive(Default)]
pub struct HashServiceBuilder {
    buckets: HashMap<u16, Vec<[u8; SUFFIX_LEN]>>,
}

impl HashServiceBuilder {
    /// UTF-8 text, one hostname per line, `#`-comments and blanks skipped.
    pub fn load_str(mut self, contents: &str) -> Self {
        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.insert(line);
        }
        self
    }

    fn insert(&mut self, host: &str) {
        let digest = hash_host(host);
        let prefix = u16::from_be_bytes([digest[0], digest[1]]);
        let suffix: [u8; SUFFIX_LEN] = digest[2..].try_into().unwrap();
        let bucket = self.buckets.entry(prefix).or_default();
        if let Err(pos) = bucket.binary_search(&suffix) {
            bucket.insert(pos, suffix);
        }
    }

    pub fn build(self) -> HashService {
        HashService { buckets: self.buckets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_probe_round_trips_to_full_hash() {
        let host = "testsb.example.org";
        let service = HashService::builder().load_str(host).build();
        assert!(service.match_host(host));

        let digest = hash_host(host);
        let prefix = &digest[..2];
        let hashes = service.match_hashes(prefix);
        assert!(hashes.contains(&hex::encode(digest)));
    }

    #[test]
    fn unrelated_host_does_not_match() {
        let service = HashService::builder().load_str("blocked.example.org").build();
        assert!(!service.match_host("safe.example.org"));
    }

    #[test]
    fn legacy_four_byte_prefix_narrows_results() {
        let service = HashService::builder()
            .load_str("one.example.org\ntwo.example.org\nthree.example.org\n")
            .build();
        let digest = hash_host("one.example.org");
        let full_prefix = &digest[..4];
        let hashes = service.match_hashes(full_prefix);
        assert_eq!(hashes, vec![hex::encode(digest)]);
    }

    #[test]
    fn buckets_stay_sorted_for_binary_search() {
        let service = HashService::builder()
            .load_str("a.example.org\nb.example.org\nc.example.org\nd.example.org\n")
            .build();
        for suffixes in service.buckets.values() {
            assert!(suffixes.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn parse_probe_labels_decodes_hex_groups() {
        let parsed = parse_probe_labels("ab12.cd34");
        assert_eq!(parsed, vec![vec![0xab, 0x12], vec![0xcd, 0x34]]);
    }
}
