//! Error type for the fallible parts of the stack.
//!
//! Malformed or unroutable packets are not errors: receive paths drop them
//! silently and parsers return `Option`. `NetError` covers the things that
//! can actually fail from the caller's point of view — the link driver and
//! the bounded tables.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    /// The link driver failed to send or receive a frame.
    #[error("link driver I/O error: {0}")]
    Io(#[from] io::Error),

    /// A bounded table (ARP cache, pending queue, UDP port table) is full.
    #[error("table is at capacity")]
    TableFull,
}
