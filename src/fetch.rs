//! HTTP collaborators for the fetch-and-refresh paths that sit outside the
//! hot request path: filter-list / hash-list downloads, the rate-limit
//! allowlist source, and the rule-hit-counter upload.
//!
//! Every download goes through a `.tmp` + atomic rename so a reader never
//! observes a partially written file, and a failed fetch always leaves the
//! previous file (or in-memory list) in place.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::app::AppError;

/// Minimum accepted size, in bytes, for a downloaded filter-list or
/// hash-list file. Anything smaller is treated as a malformed download and
/// rejected without touching the on-disk file.
const MIN_DOWNLOAD_SIZE: usize = 1024;

/// `GET` `url` with `Accept-Encoding: gzip`, decompressing the body if the
/// server actually sent a gzip-encoded response, and write the result to
/// `<path>.tmp` followed by an atomic rename to `path`. Rejects downloads
/// under [`MIN_DOWNLOAD_SIZE`] bytes without touching `path`.
pub async fn fetch_list_to_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<(), AppError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT_ENCODING, "gzip")
        .send()
        .await?
        .error_for_status()?;

    let gzipped = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .is_some_and(|v| v.as_bytes() == b"gzip");

    let body = response.bytes().await?;
    let contents = if gzipped { gunzip(&body)? } else { body.to_vec() };

    if contents.len() < MIN_DOWNLOAD_SIZE {
        return Err(AppError::Malformed(format!(
            "downloaded list from {url} is only {} bytes, minimum is {MIN_DOWNLOAD_SIZE}",
            contents.len()
        )));
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    use std::io::Read;
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| AppError::Decode(e.to_string()))?;
    Ok(out)
}

#[derive(Deserialize)]
struct AllowlistEntry {
    #[serde(rename = "Address")]
    address: Option<String>,
}

/// `GET` a JSON array of objects and pick out every `Address` field that
/// parses as an IP. Non-matching objects are skipped rather than rejecting
/// the whole response.
pub async fn fetch_allowlist(client: &reqwest::Client, url: &str) -> Result<Vec<std::net::IpAddr>, AppError> {
    let entries: Vec<AllowlistEntry> = client.get(url).send().await?.error_for_status()?.json().await?;
    Ok(entries
        .into_iter()
        .filter_map(|e| e.address)
        .filter_map(|addr| addr.parse().ok())
        .collect())
}

/// `POST` the drained rule-hit counts as
/// `{"filters":{<listId>:{<ruleText>:<count>}}}`.
pub async fn upload_rule_hits(
    client: &reqwest::Client,
    url: &str,
    counts: HashMap<(u32, String), u64>,
) -> Result<(), AppError> {
    let mut filters: HashMap<String, HashMap<String, u64>> = HashMap::new();
    for ((list_id, rule_text), count) in counts {
        filters.entry(list_id.to_string()).or_default().insert(rule_text, count);
    }
    let body = serde_json::json!({ "filters": filters });
    client.post(url).json(&body).send().await?.error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_entries_without_address_are_skipped() {
        let json = r#"[{"Address":"198.51.100.1"},{"Other":"x"},{"Address":"not-an-ip"}]"#;
        let entries: Vec<AllowlistEntry> = serde_json::from_str(json).unwrap();
        let ips: Vec<std::net::IpAddr> =
            entries.into_iter().filter_map(|e| e.address).filter_map(|a| a.parse().ok()).collect();
        assert_eq!(ips, vec!["198.51.100.1".parse::<std::net::IpAddr>().unwrap()]);
    }

    #[test]
    fn gunzip_round_trips_gzip_encoded_bytes() {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello filter list").unwrap();
        let compressed = encoder.finish().unwrap();
        let decompressed = gunzip(&compressed).unwrap();
        assert_eq!(decompressed, b"hello filter list");
    }

    #[test]
    fn short_download_is_rejected_by_min_size_check() {
        let small = vec![0u8; 10];
        assert!(small.len() < MIN_DOWNLOAD_SIZE);
    }
}
