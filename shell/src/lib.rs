//! App Host Runtime - actor-based host shell for embedded guest apps
//!
//! This crate implements the embedding lifecycle of guest contexts
//! (launch / minimize / restore) and the message-passing RPC layer that lets
//! guests invoke a capability-scoped set of host functions, gated by an
//! origin allow-list.

pub mod actors;
pub mod capability;
pub mod config;
pub mod origin;
pub mod runtime;
