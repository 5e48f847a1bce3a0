//! Threadwork - Collaboration Backend for Chat-Native Work Items
//!
//! Chat threads can be converted into typed work items (tasks, bugs, epics)
//! through inline tag commands. Every state change is persisted as an
//! event stream and propagated to internal consumers through a
//! transactional outbox and a pub/sub event bus.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
