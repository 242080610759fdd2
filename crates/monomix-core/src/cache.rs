//! Sample cache - where sound effect data comes from
//!
//! The sound system looks effects up by name and reads the raw lump:
//! an 8-byte header followed by unsigned 8-bit PCM.

use std::collections::HashMap;

/// Named raw sample storage
pub trait SampleCache: Send + Sync {
    /// Raw bytes stored under `name`, header included
    fn lookup(&self, name: &str) -> Option<&[u8]>;
}

/// Sample cache backed by a HashMap
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    lumps: HashMap<String, Vec<u8>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a lump, replacing any previous one with the same name
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.lumps.insert(name.into(), data);
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }
}

impl SampleCache for MemoryCache {
    fn lookup(&self, name: &str) -> Option<&[u8]> {
        self.lumps.get(name).map(Vec::as_slice)
    }
}
