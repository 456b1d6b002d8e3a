//! Raw upstream exchange: the innermost stage, wrapping
//! `UpstreamGroup::query` to record latency.

use std::time::Instant;

use crate::message::Message;
use crate::pipeline::PipelineServices;
use crate::upstream::UpstreamError;

pub async fn serve(services: &PipelineServices, query: &Message) -> Result<Message, UpstreamError> {
    let start = Instant::now();
    let result = services.upstream.query(query).await;
    services.metrics.record_upstream_latency(start.elapsed());
    result
}
