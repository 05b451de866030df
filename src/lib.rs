//! ReelStore Server Library
//!
//! Resumable video uploads over HTTP with byte-range retrieval.
//!
//! # Modules
//!
//! - `storage`: durable, name-keyed byte store (filesystem and in-memory)
//! - `transfer`: upload status, range parsing and chunked range streaming
//! - `routes`: HTTP endpoints wired onto an axum router
//!
//! The server binary is in main.rs.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod transfer;
