//! TTL-aware LRU response cache.
//!
//! One cache per server block. The LRU itself is always allocated up front
//! at construction time rather than lazily on first write, so there is no
//! shared mutable `Option` to race on across threads. See DESIGN.md for the
//! reasoning behind that choice.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::message::Message;

/// Binary cache key: `(DO flag, qtype, qclass, lowercased name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<u8>);

impl CacheKey {
    pub fn new(do_bit: bool, qtype: u16, qclass: u16, lowercased_name: &str) -> Self {
        let mut bytes = Vec::with_capacity(5 + lowercased_name.len());
        bytes.push(do_bit as u8);
        bytes.extend_from_slice(&qtype.to_be_bytes());
        bytes.extend_from_slice(&qclass.to_be_bytes());
        bytes.extend_from_slice(lowercased_name.as_bytes());
        Self(bytes)
    }

    pub fn from_query(query: &Message) -> Option<Self> {
        let question = query.question.as_ref()?;
        let do_bit = query.edns.map(|e| e.dnssec_ok).unwrap_or(false);
        Some(Self::new(
            do_bit,
            u16::from(question.qtype),
            u16::from(question.qclass),
            &question.host_key(),
        ))
    }
}

struct Entry {
    message: Message,
    inserted_at: Instant,
    ttl: u32,
}

pub struct ResponseCache {
    inner: Mutex<LruCache<CacheKey, Entry>>,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A reply is cacheable only if it is untruncated, carries exactly one
    /// question, has a positive minimum TTL, and is either NOERROR or
    /// NXDOMAIN — with NOERROR A/AAAA answers required to actually contain
    /// a matching record.
    pub fn is_eligible(response: &Message) -> bool {
        use hickory_server::proto::op::ResponseCode;
        use hickory_server::proto::rr::RecordType;

        if response.truncated {
            return false;
        }
        let Some(question) = &response.question else {
            return false;
        };
        let Some(min_ttl) = response.min_ttl() else {
            return false;
        };
        if min_ttl == 0 {
            return false;
        }
        if !matches!(response.response_code, ResponseCode::NoError | ResponseCode::NXDomain) {
            return false;
        }
        if response.response_code == ResponseCode::NoError
            && matches!(question.qtype, RecordType::A | RecordType::AAAA)
            && !response.has_answer_type(question.qtype)
        {
            return false;
        }
        true
    }

    /// Best-effort insert. Returns `false` without error if `response`
    /// is not eligible or carries no question.
    pub fn set(&self, response: &Message) -> bool {
        if !Self::is_eligible(response) {
            return false;
        }
        let Some(key) = Self::key_for_response(response) else {
            return false;
        };
        let ttl = response.min_ttl().unwrap_or(0);
        let mut entry = response.clone();
        entry.strip_opt();

        let mut inner = self.inner.lock().unwrap();
        inner.put(key, Entry { message: entry, inserted_at: Instant::now(), ttl });
        true
    }

    fn key_for_response(response: &Message) -> Option<CacheKey> {
        let question = response.question.as_ref()?;
        let do_bit = response.edns.map(|e| e.dnssec_ok).unwrap_or(false);
        Some(CacheKey::new(
            do_bit,
            u16::from(question.qtype),
            u16::from(question.qclass),
            &question.host_key(),
        ))
    }

    /// On hit, clone the stored message, propagate the incoming query's
    /// ID/flags, age every record's TTL by elapsed seconds (floored at
    /// zero), and strip OPT.
    pub fn get(&self, query: &Message) -> Option<Message> {
        let key = CacheKey::from_query(query)?;
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.get(&key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let elapsed = Instant::now().saturating_duration_since(entry.inserted_at);
        if elapsed >= Duration::from_secs(entry.ttl as u64) {
            inner.pop(&key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut reply = entry.message.clone();
        self.hits.fetch_add(1, Ordering::Relaxed);
        drop(inner);

        reply.set_reply_to(query);
        reply.authentic_data = reply.authentic_data && query.edns.map(|e| e.dnssec_ok).unwrap_or(false);
        reply.age_records(elapsed.as_secs() as u32);
        reply.strip_opt();
        Some(reply)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wire size of an encoded response, used to charge the rate limiter for
/// cache hits the same way it charges upstream-served replies.
pub fn response_wire_size(message: &Message) -> usize {
    message.to_wire().to_vec().map(|b| b.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode, ResponseCode};
    use hickory_server::proto::rr::rdata::A;
    use hickory_server::proto::rr::{DNSClass, Name, RData, RecordType};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn base_query(name: &str) -> Message {
        Message {
            id: 42,
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
                qtype: RecordType::A,
                qclass: DNSClass::IN,
            }),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    fn answered(query: &Message, ttl: u32) -> Message {
        let mut resp = query.clone();
        resp.message_type = MessageType::Response;
        resp.answers.push(crate::message::RecordData {
            name: query.question.as_ref().unwrap().name.clone(),
            rtype: RecordType::A,
            rclass: DNSClass::IN,
            ttl,
            rdata: RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
        });
        resp
    }

    #[test]
    fn rejects_truncated_zero_ttl_and_empty_answers() {
        let query = base_query("example.com.");
        let mut truncated = answered(&query, 300);
        truncated.truncated = true;
        assert!(!ResponseCache::is_eligible(&truncated));

        let zero_ttl = answered(&query, 0);
        assert!(!ResponseCache::is_eligible(&zero_ttl));

        let mut empty = query.clone();
        empty.message_type = MessageType::Response;
        assert!(!ResponseCache::is_eligible(&empty));

        assert!(ResponseCache::is_eligible(&answered(&query, 300)));
    }

    #[test]
    fn ttls_are_monotonically_non_increasing_across_gets() {
        let cache = ResponseCache::new(10);
        let query = base_query("example.com.");
        let response = answered(&query, 300);
        assert!(cache.set(&response));

        let first = cache.get(&query).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        let second = cache.get(&query).unwrap();

        assert!(second.answers[0].ttl <= first.answers[0].ttl);
    }

    #[test]
    fn boundary_ttl_rounds_to_zero_and_is_omitted_once_elapsed() {
        let cache = ResponseCache::new(10);
        let query = base_query("example.com.");
        let response = answered(&query, 1);
        assert!(cache.set(&response));
        assert!(cache.get(&query).is_some());

        std::thread::sleep(Duration::from_millis(1100));
        assert!(cache.get(&query).is_none());
    }

    #[test]
    fn strips_opt_from_cached_replies() {
        let cache = ResponseCache::new(10);
        let mut query = base_query("example.com.");
        query.edns = Some(crate::message::EdnsInfo { dnssec_ok: false, max_payload: 4096 });
        let mut response = answered(&query, 300);
        response.additionals.push(crate::message::RecordData {
            name: Name::root(),
            rtype: RecordType::OPT,
            rclass: DNSClass::IN,
            ttl: 0,
            rdata: RData::A(A(Ipv4Addr::UNSPECIFIED)),
        });
        cache.set(&response);
        let replayed = cache.get(&query).unwrap();
        assert!(replayed.edns.is_none());
        assert!(!replayed.additionals.iter().any(|r| r.rtype == RecordType::OPT));
    }
}
