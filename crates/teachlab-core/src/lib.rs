//! # teachlab-core
//!
//! Foundation types for the TeachLab classroom-simulation client.
//!
//! This crate provides the shared vocabulary the other teachlab crates
//! depend on:
//!
//! - **Roster**: [`roster::StudentId`], [`roster::StudentState`],
//!   [`roster::EmotionalState`], and the fixed five-member seed roster
//! - **Metrics**: [`metrics::normalize_metric`] — wire fractions to the
//!   canonical 0–100 integer scale
//! - **Session**: [`session::ConversationEntry`], [`session::Speaker`],
//!   [`session::EngagementSnapshot`], [`session::ChaosState`],
//!   [`session::SessionPhase`], [`session::SessionConfig`]
//! - **Protocol**: [`protocol::ServerFrame`] / [`protocol::ClientFrame`]
//!   tagged unions for the session WebSocket
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other teachlab crates.

#![deny(unsafe_code)]

pub mod metrics;
pub mod protocol;
pub mod roster;
pub mod session;
