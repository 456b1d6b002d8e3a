//! Alternate-upstream dispatch: wraps the raw upstream exchange and
//! re-dispatches based on the rcode it produced.

use std::sync::atomic::Ordering;

use hickory_server::proto::op::ResponseCode;

use crate::error::pipeline::PipelineError;
use crate::message::Message;
use crate::pipeline::{upstream_stage, PipelineServices};

/// `original_query` is the query as the pipeline first saw it;
/// `current_query` is the query as it stands at this point of dispatch.
/// The two are handed separately because `AlternateRule.original` decides
/// which one the alternate handler receives.
pub async fn serve(
    services: &PipelineServices,
    original_query: &Message,
    current_query: &Message,
) -> Result<Message, PipelineError> {
    let outcome = upstream_stage::serve(services, current_query).await;
    let (captured, lookup_rcode) = match &outcome {
        Ok(reply) => (Some(reply.clone()), reply.response_code),
        Err(_) => {
            services.metrics.upstream_errors_total.fetch_add(1, Ordering::Relaxed);
            (None, ResponseCode::ServFail)
        }
    };
    services.metrics.record_rcode(lookup_rcode);

    if let Some(alt) = services.alternates.for_rcode(lookup_rcode) {
        services.metrics.alternate_dispatched_total.fetch_add(1, Ordering::Relaxed);
        let query_to_send = if alt.use_original_query { original_query } else { current_query };
        let client = services.alternates.client_for(alt.address);
        return client
            .query(query_to_send)
            .await
            .map(|mut reply| {
                reply.set_reply_to(current_query);
                reply
            })
            .map_err(|e| PipelineError::MalformedReply(e.to_string()));
    }

    captured.ok_or(PipelineError::UpstreamUnreachable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode};
    use hickory_server::proto::rr::{DNSClass, Name, RecordType};
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
    async fn unreachable_upstream_with_no_alternate_rule_is_reported() {
        let services = crate::pipeline::test_support::services();
        let q = query();
        let result = serve(&services, &q, &q).await;
        assert!(matches!(result, Err(PipelineError::UpstreamUnreachable)));
    }
}
