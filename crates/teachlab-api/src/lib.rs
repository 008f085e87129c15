//! # teachlab-api
//!
//! HTTP client for the session server's request/response surface — the calls
//! that live outside the persistent session WebSocket:
//!
//! - session creation ([`ApiClient::create_session`])
//! - end-of-session report ([`ApiClient::session_report`])
//! - speech-to-text ([`ApiClient::transcribe`])
//! - chaos injection ([`ApiClient::inject_chaos`])
//! - health check ([`ApiClient::health`])
//!
//! ## Crate Position
//!
//! Depends on teachlab-core and teachlab-settings. Depended on by
//! teachlab-client and the CLI.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod types;

pub use client::ApiClient;
pub use errors::{ApiError, Result};
pub use types::*;
