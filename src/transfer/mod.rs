//! Resumable transfer core
//!
//! - `status`: how many bytes of a name are durably stored
//! - `range`: parsing `Range` headers and clamping them to what can be served
//! - `streamer`: opening a bounded chunk of a stored file
//!
//! Every request is recomputed from client-supplied offsets; there is no
//! server-side session state.

pub mod error;
pub mod range;
pub mod status;
pub mod streamer;
pub mod types;

pub use error::TransferError;
pub use range::{RangeRequest, ServiceableRange, DEFAULT_CHUNK_CEILING};
pub use status::UploadStatusResolver;
pub use streamer::{RangeChunk, RangeStreamer};
pub use types::*;
