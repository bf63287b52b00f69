//! Library entry for brewdeck exposing the backend, cache, model and
//! coordinator for the binary and for integration tests.

pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod model;
pub mod state;

#[cfg(test)]
mod test_utils;
