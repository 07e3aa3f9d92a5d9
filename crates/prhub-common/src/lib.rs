//! # prhub-common
//!
//! Shared types, configuration, error handling, and business rules used across
//! all PR Hub crates. This is the foundation layer: no I/O, just primitives,
//! contracts, and the pure rules the handlers apply.

pub mod auth;
pub mod config;
pub mod error;
pub mod gamification;
pub mod ids;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod validation;
