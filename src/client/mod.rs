//! Client module
//!
//! Supervises the connection to the server: connect, run the
//! multiplexing session, reconnect with backoff when it drops.

mod client;

pub use client::{run_client, Client};
