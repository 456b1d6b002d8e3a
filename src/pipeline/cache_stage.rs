//! Response-cache stage: serves a fresh, TTL-aged reply from
//! [`crate::cache::ResponseCache`] when one is eligible, otherwise
//! delegates to the alternate-upstream stage and stores the result.

use std::sync::atomic::Ordering;

use crate::error::pipeline::PipelineError;
use crate::message::Message;
use crate::pipeline::{alternate_stage, PipelineServices};

pub async fn serve(services: &PipelineServices, query: &Message) -> Result<Message, PipelineError> {
    if let Some(cached) = services.cache.get(query) {
        services.metrics.cache_hits_total.fetch_add(1, Ordering::Relaxed);
        return Ok(cached);
    }
    services.metrics.cache_misses_total.fetch_add(1, Ordering::Relaxed);

    let response = alternate_stage::serve(services, query, query).await?;
    services.cache.set(&response);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode, ResponseCode};
    use hickory_server::proto::rr::rdata::A;
    use hickory_server::proto::rr::{DNSClass, Name, RData, RecordType};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn query() -> Message {
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
                qtype: RecordType::A,
                qclass: DNSClass::IN,
            }),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    #[tokio::test]
    async fn second_lookup_for_the_same_question_is_a_cache_hit() {
        let services = crate::pipeline::test_support::services();
        let q = query();
        let mut answered = q.clone();
        answered.message_type = MessageType::Response;
        answered.answers.push(crate::message::RecordData {
            name: q.question.as_ref().unwrap().name.clone(),
            rtype: RecordType::A,
            rclass: DNSClass::IN,
            ttl: 300,
            rdata: RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
        });
        services.cache.set(&answered);

        let result = serve(&services, &q).await.unwrap();
        assert_eq!(result.answers.len(), 1);
        assert_eq!(services.cache.hits.load(Ordering::Relaxed), 1);
    }
}
