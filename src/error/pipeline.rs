//! Pipeline errors and their mapping to DNS response codes.

use hickory_server::proto::op::ResponseCode;

/// Errors a pipeline handler can raise. Every variant has a fixed, documented
/// rcode it maps to when it reaches the pipeline's top-level error boundary.
#[derive(Debug)]
pub enum PipelineError {
    /// The query did not carry exactly one question.
    MalformedQuery,
    /// The upstream reply's transaction ID did not match the query, or the
    /// reply was below the minimum accepted size.
    MalformedReply(String),
    /// Every upstream (primary and fallback) failed or timed out.
    UpstreamUnreachable,
    /// A handler-internal failure not covered by a more specific variant
    /// (storage errors bubbled up from a lookup, a poisoned lock, etc.).
    Internal(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedQuery => write!(f, "malformed query"),
            Self::MalformedReply(msg) => write!(f, "malformed upstream reply: {msg}"),
            Self::UpstreamUnreachable => write!(f, "upstream unreachable"),
            Self::Internal(msg) => write!(f, "internal pipeline error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// The rcode a client should see for this error. Malformed queries get
    /// FORMERR; everything else is reported as SERVFAIL since none of it
    /// should ever reach the client verbatim.
    pub fn rcode(&self) -> ResponseCode {
        match self {
            Self::MalformedQuery => ResponseCode::FormErr,
            Self::MalformedReply(_) | Self::UpstreamUnreachable | Self::Internal(_) => {
                ResponseCode::ServFail
            }
        }
    }
}

impl From<crate::error::app::AppError> for PipelineError {
    fn from(value: crate::error::app::AppError) -> Self {
        Self::Internal(value.to_string())
    }
}
