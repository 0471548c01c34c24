//! Remote forum API: domain types, wire types and the client talking to it.

pub mod api_types;
pub mod cache;
pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod transport;
pub mod tree;
pub mod types;
