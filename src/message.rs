//! Typed DNS message model.
//!
//! Wraps the pieces of `hickory-proto`'s wire-level `Message` the pipeline
//! actually touches: a single question, the three record sections, and the
//! EDNS0 pseudo-record. Pipeline stages, the cache, and the query-log buffer
//! all operate on this type rather than importing `hickory_server::proto`
//! directly, so a future swap of the underlying DNS library only touches
//! this module.

use hickory_server::proto::op::{Header, Message as WireMessage, MessageType, OpCode, ResponseCode};
use hickory_server::proto::rr::{DNSClass, Name, RData, Record, RecordType};

/// A single DNS question; this server only ever handles messages carrying
/// exactly one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub name: Name,
    pub qtype: RecordType,
    pub qclass: DNSClass,
}

impl Question {
    /// Lowercased, trailing-dot-stripped hostname, as used by every
    /// filtering engine's lookup key.
    pub fn host_key(&self) -> String {
        let mut s = self.name.to_ascii().to_lowercase();
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

/// EDNS0 state carried end-to-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdnsInfo {
    pub dnssec_ok: bool,
    pub max_payload: u16,
}

/// A single answer/authority/additional record, decoupled from the wire
/// representation so it can be cloned cheaply into cache entries.
#[derive(Clone, Debug)]
pub struct RecordData {
    pub name: Name,
    pub rtype: RecordType,
    pub rclass: DNSClass,
    pub ttl: u32,
    pub rdata: RData,
}

impl RecordData {
    pub fn to_wire(&self) -> Record {
        Record::from_rdata(self.name.clone(), self.ttl, self.rdata.clone())
    }

    fn from_wire(record: &Record) -> Option<Self> {
        let rdata = record.data().clone();
        Some(Self {
            name: record.name().clone(),
            rtype: record.record_type(),
            rclass: record.dns_class(),
            ttl: record.ttl(),
            rdata,
        })
    }
}

/// A DNS query or response, independent of transport.
#[derive(Clone, Debug)]
pub struct Message {
    pub id: u16,
    pub op_code: OpCode,
    pub message_type: MessageType,
    pub response_code: ResponseCode,
    pub truncated: bool,
    pub authoritative: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub authentic_data: bool,
    pub checking_disabled: bool,
    pub question: Option<Question>,
    pub answers: Vec<RecordData>,
    pub name_servers: Vec<RecordData>,
    pub additionals: Vec<RecordData>,
    pub edns: Option<EdnsInfo>,
}

impl Message {
    /// Build from a wire `Message`, as received from a listener or an
    /// upstream reply.
    pub fn from_wire(msg: &WireMessage) -> Self {
        let question = msg.queries().first().map(|q| Question {
            name: q.name().clone(),
            qtype: q.query_type(),
            qclass: q.query_class(),
        });

        let edns = msg.edns().map(|e| EdnsInfo {
            dnssec_ok: e.flags().dnssec_ok,
            max_payload: e.max_payload(),
        });

        Self {
            id: msg.id(),
            op_code: msg.op_code(),
            message_type: msg.message_type(),
            response_code: msg.response_code(),
            truncated: msg.truncated(),
            authoritative: msg.authoritative(),
            recursion_desired: msg.recursion_desired(),
            recursion_available: msg.recursion_available(),
            authentic_data: msg.authentic_data(),
            checking_disabled: msg.checking_disabled(),
            question,
            answers: msg.answers().iter().filter_map(RecordData::from_wire).collect(),
            name_servers: msg
                .name_servers()
                .iter()
                .filter_map(RecordData::from_wire)
                .collect(),
            additionals: msg
                .additionals()
                .iter()
                .filter_map(RecordData::from_wire)
                .collect(),
            edns,
        }
    }

    /// Render back to a wire `Message` suitable for sending or re-encoding.
    pub fn to_wire(&self) -> WireMessage {
        let mut msg = WireMessage::new();
        let mut header = Header::new();
        header.set_id(self.id);
        header.set_op_code(self.op_code);
        header.set_message_type(self.message_type);
        header.set_response_code(self.response_code);
        header.set_truncated(self.truncated);
        header.set_authoritative(self.authoritative);
        header.set_recursion_desired(self.recursion_desired);
        header.set_recursion_available(self.recursion_available);
        header.set_authentic_data(self.authentic_data);
        header.set_checking_disabled(self.checking_disabled);
        msg.set_header(header);

        if let Some(q) = &self.question {
            let mut query = hickory_server::proto::op::Query::new();
            query.set_name(q.name.clone());
            query.set_query_type(q.qtype);
            query.set_query_class(q.qclass);
            msg.add_query(query);
        }

        for r in &self.answers {
            msg.add_answer(r.to_wire());
        }
        for r in &self.name_servers {
            msg.add_name_server(r.to_wire());
        }
        for r in &self.additionals {
            msg.add_additional(r.to_wire());
        }

        if let Some(edns_info) = &self.edns {
            let edns = msg.extensions_mut().get_or_insert_with(Default::default);
            edns.set_dnssec_ok(edns_info.dnssec_ok);
            edns.set_max_payload(edns_info.max_payload.max(512));
        }

        msg
    }

    /// Propagate the incoming query's ID and `RD` flag onto a response the
    /// way `hickory`'s `SetReply` does, used by the cache's read path.
    pub fn set_reply_to(&mut self, query: &Message) {
        self.id = query.id;
        self.recursion_desired = query.recursion_desired;
        self.message_type = MessageType::Response;
        self.authoritative = false;
    }

    /// Minimum TTL across answer/authority/additional sections, excluding
    /// OPT pseudo-records. `None` if there are no eligible records at all.
    pub fn min_ttl(&self) -> Option<u32> {
        self.answers
            .iter()
            .chain(self.name_servers.iter())
            .chain(self.additionals.iter())
            .filter(|r| r.rtype != RecordType::OPT)
            .map(|r| r.ttl)
            .min()
    }

    /// Decrement every record TTL in place by `elapsed` seconds, floored at
    /// zero. Used by the cache's read path to age a stored reply.
    pub fn age_records(&mut self, elapsed_secs: u32) {
        for r in self
            .answers
            .iter_mut()
            .chain(self.name_servers.iter_mut())
            .chain(self.additionals.iter_mut())
        {
            r.ttl = r.ttl.saturating_sub(elapsed_secs);
        }
    }

    /// Strip the OPT pseudo-record; it is hop-by-hop and must not survive
    /// a cache replay.
    pub fn strip_opt(&mut self) {
        self.edns = None;
        self.additionals.retain(|r| r.rtype != RecordType::OPT);
    }

    pub fn has_answer_type(&self, rtype: RecordType) -> bool {
        self.answers.iter().any(|r| r.rtype == rtype)
    }

    /// Build an empty response to `query` carrying `rcode`, preserving
    /// the question, ID, RD flag, and EDNS0 state. The common starting
    /// point for every pipeline stage that synthesizes its own reply.
    pub fn empty_reply(query: &Message, rcode: ResponseCode) -> Message {
        Message {
            id: query.id,
            op_code: query.op_code,
            message_type: MessageType::Response,
            response_code: rcode,
            truncated: false,
            authoritative: false,
            recursion_desired: query.recursion_desired,
            recursion_available: true,
            authentic_data: false,
            checking_disabled: query.checking_disabled,
            question: query.question.clone(),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: query.edns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::rr::rdata::A;
    use std::str::FromStr;
    use std::net::Ipv4Addr;

    fn sample_answer(name: &str, ttl: u32) -> RecordData {
        RecordData {
            name: Name::from_str(name).unwrap(),
            rtype: RecordType::A,
            rclass: DNSClass::IN,
            ttl,
            rdata: RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
        }
    }

    #[test]
    fn min_ttl_ignores_opt_and_picks_lowest() {
        let mut msg = Message {
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
            question: None,
            answers: vec![sample_answer("example.com.", 300), sample_answer("example.com.", 60)],
            name_servers: vec![],
            additionals: vec![RecordData {
                name: Name::root(),
                rtype: RecordType::OPT,
                rclass: DNSClass::IN,
                ttl: 5,
                rdata: RData::A(A(Ipv4Addr::UNSPECIFIED)),
            }],
            edns: None,
        };
        assert_eq!(msg.min_ttl(), Some(60));

        msg.age_records(45);
        assert_eq!(msg.answers[1].ttl, 15);
        assert_eq!(msg.answers[0].ttl, 255);
    }

    #[test]
    fn strip_opt_removes_edns_and_opt_record() {
        let mut msg = Message {
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
            question: None,
            answers: vec![],
            name_servers: vec![],
            additionals: vec![RecordData {
                name: Name::root(),
                rtype: RecordType::OPT,
                rclass: DNSClass::IN,
                ttl: 0,
                rdata: RData::A(A(Ipv4Addr::UNSPECIFIED)),
            }],
            edns: Some(EdnsInfo { dnssec_ok: true, max_payload: 4096 }),
        };
        msg.strip_opt();
        assert!(msg.edns.is_none());
        assert!(msg.additionals.is_empty());
    }

    #[test]
    fn host_key_lowercases_and_strips_trailing_dot() {
        let q = Question {
            name: Name::from_str("DoubleClick.Net.").unwrap(),
            qtype: RecordType::A,
            qclass: DNSClass::IN,
        };
        assert_eq!(q.host_key(), "doubleclick.net");
    }
}
