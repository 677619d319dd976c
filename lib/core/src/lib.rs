//! Core types and utilities for the tradeportal client.
//!
//! This crate provides the foundational identifiers and the error-handling
//! alias shared by the session and API crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, RequestId, TabId};
