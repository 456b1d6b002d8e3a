//! Error types shared across the pipeline, storage, and admin HTTP layers.
//!
//! Split three ways: `app` holds generic decode/parse/io/storage failures,
//! `pipeline` maps failures to the DNS rcode the client ultimately sees,
//! and `http` maps failures to the admin surface's status codes.
pub mod app;
pub mod http;
pub mod pipeline;

pub use app::AppError;
pub use http::AdminHttpError;
pub use pipeline::PipelineError;
