//! Access-key-scoped encrypted file exchange.
//!
//! Clients hash their secret access key locally and present only the hash;
//! the server stores opaque encrypted blobs keyed by client-generated file
//! ids and scoped to that hash. Files expire after a configurable retention
//! period: expired rows are evicted lazily on access and purged by a
//! periodic sweep.

pub mod retention;
pub mod routes;
pub mod store;
