//! Anonymous short-message board.
//!
//! Accepts messages of up to 50 characters over HTTP, stores them in SQLite
//! and serves the ten most recent. Writes are throttled per client by a
//! salted hash of the client's address.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
