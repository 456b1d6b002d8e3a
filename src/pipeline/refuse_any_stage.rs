//! Refuse-ANY stage: `question.type == ANY` short-circuits with `NOTIMPL`
//! before anything downstream is invoked, per Invariant 2.

use hickory_server::proto::op::ResponseCode;
use hickory_server::proto::rr::RecordType;
use std::sync::atomic::Ordering;

use crate::message::Message;
use crate::pipeline::PipelineServices;

/// `Some(reply)` if `query` asked for `ANY` and has already been answered;
/// callers must stop the pipeline in that case. `None` delegates downstream.
pub fn serve(services: &PipelineServices, query: &Message) -> Option<Message> {
    let question = query.question.as_ref()?;
    if question.qtype != RecordType::ANY {
        return None;
    }
    services.metrics.refused_any_total.fetch_add(1, Ordering::Relaxed);
    Some(Message::empty_reply(query, ResponseCode::NotImp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode};
    use hickory_server::proto::rr::{DNSClass, Name};
    use std::str::FromStr;

    fn query(qtype: RecordType) -> Message {
        Message {
            id: 1,
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
                name: Name::from_str("example.com.").unwrap(),
                qtype,
                qclass: DNSClass::IN,
            }),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    #[test]
    fn any_query_gets_notimp() {
        let services = crate::pipeline::test_support::services();
        let reply = serve(&services, &query(RecordType::ANY)).unwrap();
        assert_eq!(reply.response_code, ResponseCode::NotImp);
    }

    #[test]
    fn non_any_query_delegates() {
        let services = crate::pipeline::test_support::services();
        assert!(serve(&services, &query(RecordType::A)).is_none());
    }
}
