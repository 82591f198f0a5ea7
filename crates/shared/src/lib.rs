//! Domain records, wire payloads and domain-level failures shared by the
//! newsdesk client crates.

pub mod domain;
pub mod error;
pub mod protocol;
