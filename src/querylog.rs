//! dnsdb-equivalent query-log buffer: captures successful A/AAAA replies,
//! periodically rotates into a durable bucket, and serializes that bucket
//! to CSV for the admin dump endpoint.

use std::collections::HashMap;
use std::sync::Mutex;

use hickory_server::proto::op::ResponseCode;
use hickory_server::proto::rr::RecordType;

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: String,
    pub rcode: String,
    pub answer: String,
    pub hits: u64,
}

fn record_key(name: &str, rtype: &str) -> String {
    format!("{}_{}", name.to_ascii_lowercase(), rtype)
}

fn eligible(response: &Message) -> Option<(&crate::message::Question, &str)> {
    let question = response.question.as_ref()?;
    if response.response_code != ResponseCode::NoError {
        return None;
    }
    let rtype = match question.qtype {
        RecordType::A => "A",
        RecordType::AAAA => "AAAA",
        _ => return None,
    };
    Some((question, rtype))
}

/// The in-memory write buffer a pipeline stage appends to on every
/// eligible response. Not durable; flushed into a [`QueryLogStore`] on
/// rotation.
#[derive(Default)]
pub struct QueryLogBuffer {
    entries: Mutex<HashMap<String, Vec<Record>>>,
}

impl QueryLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, response: &Message) {
        let Some((question, rtype)) = eligible(response) else { return };
        let key = record_key(&question.host_key(), rtype);
        let rcode = "NOERROR".to_string();

        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get_mut(&key) {
            for record in existing.iter_mut() {
                record.hits += 1;
            }
            return;
        }

        let answers: Vec<String> = response
            .answers
            .iter()
            .filter(|r| r.rtype == question.qtype)
            .map(|r| format!("{:?}", r.rdata))
            .collect();

        let records = if answers.is_empty() {
            vec![Record { name: question.host_key(), rtype: rtype.to_string(), rcode, answer: String::new(), hits: 1 }]
        } else {
            answers
                .into_iter()
                .map(|answer| Record { name: question.host_key(), rtype: rtype.to_string(), rcode: rcode.clone(), answer, hits: 1 })
                .collect()
        };
        entries.insert(key, records);
    }

    /// Drain the buffer, returning its contents for merging into a
    /// durable bucket.
    pub fn drain(&self) -> HashMap<String, Vec<Record>> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A durable bucket of merged records. `rotate` swaps the active bucket
/// for a fresh empty one and hands back the rotated contents for the
/// dump endpoint to serialize.
#[derive(Default)]
pub struct QueryLogStore {
    active: Mutex<HashMap<String, Vec<Record>>>,
}

impl QueryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge buffered entries into the active bucket, carrying forward
    /// each record's prior hit total.
    pub fn merge(&self, incoming: HashMap<String, Vec<Record>>) {
        let mut active = self.active.lock().unwrap();
        for (key, records) in incoming {
            match active.get_mut(&key) {
                Some(existing) => {
                    for record in records {
                        match existing.iter_mut().find(|r| r.answer == record.answer) {
                            Some(found) => found.hits += record.hits,
                            None => existing.push(record),
                        }
                    }
                }
                None => {
                    active.insert(key, records);
                }
            }
        }
    }

    /// Close the active bucket and open a fresh empty one, returning the
    /// rotated contents.
    pub fn rotate(&self) -> HashMap<String, Vec<Record>> {
        std::mem::take(&mut *self.active.lock().unwrap())
    }

    pub fn to_csv(rotated: &HashMap<String, Vec<Record>>) -> String {
        let mut out = String::from("name,type,rcode,answer,hits\n");
        let mut keys: Vec<_> = rotated.keys().collect();
        keys.sort();
        for key in keys {
            for record in &rotated[key] {
                out.push_str(&format!(
                    "{},{},{},{},{}\n",
                    record.name, record.rtype, record.rcode, record.answer, record.hits
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode};
    use hickory_server::proto::rr::rdata::A;
    use hickory_server::proto::rr::{DNSClass, Name, RData};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn a_response(name: &str, ip: Ipv4Addr) -> Message {
        Message {
            id: 1,
            op_code: OpCode::Query,
            message_type: MessageType::Response,
            response_code: ResponseCode::NoError,
            truncated: false,
            authoritative: false,
            recursion_desired: true,
            recursion_available: true,
            authentic_data: false,
            checking_disabled: false,
            question: Some(crate::message::Question {
                name: Name::from_str(name).unwrap(),
                qtype: RecordType::A,
                qclass: DNSClass::IN,
            }),
            answers: vec![crate::message::RecordData {
                name: Name::from_str(name).unwrap(),
                rtype: RecordType::A,
                rclass: DNSClass::IN,
                ttl: 300,
                rdata: RData::A(A(ip)),
            }],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    #[test]
    fn second_write_for_same_key_increments_hits_without_duplicating() {
        let buffer = QueryLogBuffer::new();
        buffer.record(&a_response("example.com.", Ipv4Addr::new(1, 2, 3, 4)));
        buffer.record(&a_response("example.com.", Ipv4Addr::new(1, 2, 3, 4)));
        let drained = buffer.drain();
        let records = &drained["example.com_A"];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hits, 2);
    }

    #[test]
    fn rotation_merges_hit_counts_into_the_durable_bucket() {
        let buffer = QueryLogBuffer::new();
        buffer.record(&a_response("example.com.", Ipv4Addr::new(1, 2, 3, 4)));
        let store = QueryLogStore::new();
        store.merge(buffer.drain());

        let buffer2 = QueryLogBuffer::new();
        buffer2.record(&a_response("example.com.", Ipv4Addr::new(1, 2, 3, 4)));
        buffer2.record(&a_response("example.com.", Ipv4Addr::new(1, 2, 3, 4)));
        store.merge(buffer2.drain());

        let rotated = store.rotate();
        assert_eq!(rotated["example.com_A"][0].hits, 3);
    }

    #[test]
    fn csv_dump_has_header_and_one_row_per_answer() {
        let mut rotated = HashMap::new();
        rotated.insert(
            "example.com_A".to_string(),
            vec![Record { name: "example.com".into(), rtype: "A".into(), rcode: "NOERROR".into(), answer: "1.2.3.4".into(), hits: 5 }],
        );
        let csv = QueryLogStore::to_csv(&rotated);
        assert!(csv.starts_with("name,type,rcode,answer,hits\n"));
        assert!(csv.contains("example.com,A,NOERROR,1.2.3.4,5"));
    }

    #[test]
    fn non_noerror_response_is_not_recorded() {
        let mut resp = a_response("blocked.test.", Ipv4Addr::UNSPECIFIED);
        resp.response_code = ResponseCode::NXDomain;
        let buffer = QueryLogBuffer::new();
        buffer.record(&resp);
        assert!(buffer.is_empty());
    }
}
