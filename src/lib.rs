//! skilltree: point-budget skill tree builder
//!
//! - [`domain`]: rule engine, stackable levels, layout and build snapshots (no I/O)
//! - [`application`]: services loading datasets and persisting builds
//! - [`infrastructure`]: filesystem boundary and service wiring
//! - [`cli`]: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
