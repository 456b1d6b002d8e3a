//! Minimal TLS certificate index for encrypted-transport listeners.
//!
//! Only the interface the (out-of-scope) handshake machinery would call
//! is implemented here: a name-indexed certificate table, an approximate
//! IP-prefix binding lookup, and session-ticket rotation. Constructing an
//! actual `rustls::ServerConfig` and wiring it into a listener is left to
//! the caller.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rustls::sign::CertifiedKey;

struct Binding {
    prefix: IpAddr,
    prefix_len: u8,
    cert_name: String,
}

/// Approximates CIDR matching without a dedicated crate: compares the
/// leading `prefix_len` bits of `ip` against `prefix`. Both addresses
/// must be the same family; a mismatch never matches.
fn ip_in_prefix(ip: IpAddr, prefix: IpAddr, prefix_len: u8) -> bool {
    match (ip, prefix) {
        (IpAddr::V4(ip), IpAddr::V4(prefix)) => {
            let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len.min(32)) };
            (u32::from(ip) & mask) == (u32::from(prefix) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(prefix)) => {
            let mask = if prefix_len == 0 { 0u128 } else { u128::MAX << (128 - prefix_len.min(128)) };
            (u128::from(ip) & mask) == (u128::from(prefix) & mask)
        }
        _ => false,
    }
}

pub struct CertManager {
    certs: Mutex<HashMap<String, Arc<CertifiedKey>>>,
    bindings: Mutex<Vec<Binding>>,
    session_ticket_rotation: Duration,
    last_rotation: Mutex<Instant>,
}

impl CertManager {
    pub fn new(session_ticket_rotation: Duration) -> Self {
        Self {
            certs: Mutex::new(HashMap::new()),
            bindings: Mutex::new(Vec::new()),
            session_ticket_rotation,
            last_rotation: Mutex::new(Instant::now()),
        }
    }

    pub fn install_cert(&self, name: &str, cert: Arc<CertifiedKey>) {
        self.certs.lock().unwrap().insert(name.to_string(), cert);
    }

    pub fn bind_prefix(&self, prefix: IpAddr, prefix_len: u8, cert_name: &str) {
        self.bindings.lock().unwrap().push(Binding { prefix, prefix_len, cert_name: cert_name.to_string() });
    }

    /// Resolve the certificate a handshake for `server_name` from
    /// `client_ip` should present: an exact name match wins; otherwise
    /// the first IP-prefix binding that contains `client_ip`.
    pub fn resolve(&self, server_name: &str, client_ip: IpAddr) -> Option<Arc<CertifiedKey>> {
        let certs = self.certs.lock().unwrap();
        if let Some(cert) = certs.get(server_name) {
            return Some(cert.clone());
        }

        let bindings = self.bindings.lock().unwrap();
        bindings
            .iter()
            .find(|b| ip_in_prefix(client_ip, b.prefix, b.prefix_len))
            .and_then(|b| certs.get(&b.cert_name).cloned())
    }

    pub fn due_for_rotation(&self, now: Instant) -> bool {
        now.saturating_duration_since(*self.last_rotation.lock().unwrap()) >= self.session_ticket_rotation
    }

    /// Mark every index entry as having rotated. The actual session
    /// ticket key regeneration is owned by the (out-of-scope) handshake
    /// machinery; this just tracks the schedule every clone observes.
    pub fn rotate_session_tickets(&self, now: Instant) {
        *self.last_rotation.lock().unwrap() = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::CertificateDer;
    use rustls::sign::{Signer, SigningKey};
    use rustls::{Error as TlsError, SignatureAlgorithm, SignatureScheme};

    #[derive(Debug)]
    struct DummySigner;

    impl Signer for DummySigner {
        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, TlsError> {
            Ok(vec![0u8; 4])
        }

        fn scheme(&self) -> SignatureScheme {
            SignatureScheme::ED25519
        }
    }

    #[derive(Debug)]
    struct DummySigningKey;

    impl SigningKey for DummySigningKey {
        fn choose_scheme(&self, _offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
            Some(Box::new(DummySigner))
        }

        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::ED25519
        }
    }

    fn dummy_cert() -> Arc<CertifiedKey> {
        let cert = CertificateDer::from(vec![0u8; 4]);
        Arc::new(CertifiedKey::new(vec![cert], Arc::new(DummySigningKey)))
    }

    #[test]
    fn exact_name_match_wins_over_prefix_binding() {
        let manager = CertManager::new(Duration::from_secs(3600));
        manager.install_cert("a.example.com", dummy_cert());
        let resolved = manager.resolve("a.example.com", "203.0.113.5".parse().unwrap());
        assert!(resolved.is_some());
    }

    #[test]
    fn ipv4_24_bit_prefix_matches_same_subnet_only() {
        assert!(ip_in_prefix(
            "192.0.2.200".parse().unwrap(),
            "192.0.2.0".parse().unwrap(),
            24
        ));
        assert!(!ip_in_prefix(
            "192.0.3.1".parse().unwrap(),
            "192.0.2.0".parse().unwrap(),
            24
        ));
    }

    #[test]
    fn rotation_due_after_configured_interval_elapses() {
        let manager = CertManager::new(Duration::from_millis(10));
        assert!(!manager.due_for_rotation(Instant::now()));
        std::thread::sleep(Duration::from_millis(15));
        assert!(manager.due_for_rotation(Instant::now()));
        manager.rotate_session_tickets(Instant::now());
        assert!(!manager.due_for_rotation(Instant::now()));
    }
}
