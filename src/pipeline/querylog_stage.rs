//! Response-recorder stage: captures the final response into the
//! dnsdb-equivalent query-log buffer, then passes it through unchanged.
//! Sits above the cache so both cache hits and fresh upstream answers get
//! logged.

use crate::error::pipeline::PipelineError;
use crate::message::Message;
use crate::pipeline::{cache_stage, PipelineServices};

pub async fn serve(services: &PipelineServices, query: &Message) -> Result<Message, PipelineError> {
    let response = cache_stage::serve(services, query).await?;
    services.query_log.record(&response);
    Ok(response)
}
