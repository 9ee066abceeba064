//! Infrastructure layer
//!
//! Abstractions over external concerns, currently the shared HTTP client
//! used for all broker calls.

pub mod http_client;
