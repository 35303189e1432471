//! gator: a command-line RSS aggregator.
//!
//! Feeds are registered by users and polled one at a time on a fixed interval;
//! new items are stored as posts in SQLite and browsed from the terminal.

pub mod commands;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
