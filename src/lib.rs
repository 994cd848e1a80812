//! auth-gateway - A minimal authentication gateway
//!
//! This crate exposes username/password and shared-secret login endpoints
//! that issue bearer tokens, throttle repeated failures with a temporary
//! lockout and write an audit trail of every attempt.

pub mod audit;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod otel;
pub mod server;
