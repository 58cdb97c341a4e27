//! # hallpass-server
//!
//! HTTP server library for the hallpass classroom attendance and hall-pass
//! tracking system.
//!
//! This library provides the API handlers, shared state and logging setup
//! used by the `hallpass-server` binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
