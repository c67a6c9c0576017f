//! Core data types: identifiers, payloads, constraints, requests, states.

pub mod constraints;
pub mod payload;
pub mod request;
pub mod state;
pub mod types;
