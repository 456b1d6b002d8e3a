//! Outbound resolution: a single upstream's UDP/TCP transport, a LIFO
//! connection pool for TCP, and a primary+fallback group with health
//! checking.

mod group;
mod pool;
mod proxy;

pub use group::UpstreamGroup;
pub use pool::ConnectionPool;
pub use proxy::{UpstreamClient, UpstreamError};
