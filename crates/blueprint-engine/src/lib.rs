//! Design workflow service.
//!
//! [`DesignService`] is what the HTTP server exposes: job launch and poll,
//! streamed steps, validation, decision extraction and project blobs.
//! [`DesignApi`] is the same surface seen from a client.

mod api;
mod error;
mod service;
pub mod wire;

pub use api::{ApiBridge, ApiError, DesignApi, LocalDesignApi, collect_stream};
pub use error::ServiceError;
pub use service::DesignService;
