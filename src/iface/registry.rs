//! Protocol dispatch registry.
//!
//! A plain mapping from a numeric protocol identifier to a handler.
//! Ethernet keys it by EtherType, IP by protocol number; dispatch is a
//! lookup followed by an invoke, and an unknown identifier is reported to
//! the caller rather than raised — the IP layer turns that into an ICMP
//! protocol-unreachable, Ethernet into a silent drop.

use std::collections::HashMap;
use std::hash::Hash;

pub struct Registry<K, H> {
    handlers: HashMap<K, H>,
}

impl<K: Eq + Hash, H> Registry<K, H> {
    pub fn new() -> Self {
        Registry {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `id`. Registering the same id again replaces
    /// the previous handler.
    pub fn register(&mut self, id: K, handler: H) {
        self.handlers.insert(id, handler);
    }

    /// Look up the handler for `id`.
    pub fn lookup(&self, id: &K) -> Option<&H> {
        self.handlers.get(id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<K: Eq + Hash, H> Default for Registry<K, H> {
    fn default() -> Self {
        Self::new()
    }
}
