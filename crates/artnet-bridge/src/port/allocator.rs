//! Port index allocation
//!
//! An Art-Net node can expose at most 255 ports. Index 0 belongs to the
//! node's root port, so interfaces draw from the remaining 254. Released
//! indices go back on a free list and the lowest one is handed out first,
//! which keeps port numbering compact and stable across re-creation.

use std::collections::BTreeSet;

use crate::error::CapacityExhausted;

/// Maximum number of ports one Art-Net node can advertise
pub const MAX_PORTS: usize = 255;

/// Index of one allocated interface (1-based; 0 is the root port)
pub type PortIndex = u8;

/// Bounded pool of port indices
#[derive(Debug, Clone)]
pub struct PortIndexAllocator {
    capacity: usize,
    remaining: usize,
    live: BTreeSet<PortIndex>,
    free: BTreeSet<PortIndex>,
}

impl Default for PortIndexAllocator {
    fn default() -> Self {
        Self::new(MAX_PORTS - 1)
    }
}

impl PortIndexAllocator {
    /// Create a pool with room for `capacity` indices (clamped to 254)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_PORTS - 1);
        Self {
            capacity,
            remaining: capacity,
            live: BTreeSet::new(),
            free: BTreeSet::new(),
        }
    }

    /// Take the lowest free index, or the next sequential one
    pub fn allocate(&mut self) -> Result<PortIndex, CapacityExhausted> {
        if self.remaining == 0 {
            return Err(CapacityExhausted {
                max: self.capacity,
            });
        }

        // With an empty free list the live set is exactly 1..=len, so the
        // running count gives the next unused index.
        let index = match self.free.pop_first() {
            Some(index) => index,
            None => (self.live.len() + 1) as PortIndex,
        };

        self.remaining -= 1;
        self.live.insert(index);
        tracing::debug!(
            "Allocated port index {} ({} remaining)",
            index,
            self.remaining
        );
        Ok(index)
    }

    /// Return an index to the pool
    ///
    /// Releasing an index that is not live is ignored.
    pub fn release(&mut self, index: PortIndex) -> bool {
        if !self.live.remove(&index) {
            tracing::warn!("Ignoring release of unowned port index {}", index);
            return false;
        }

        self.remaining += 1;
        self.free.insert(index);
        tracing::debug!(
            "Released port index {} ({} remaining)",
            index,
            self.remaining
        );
        true
    }

    /// Indices still available
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True while another index can be allocated
    pub fn has_capacity(&self) -> bool {
        self.remaining > 0
    }

    pub fn is_live(&self, index: PortIndex) -> bool {
        self.live.contains(&index)
    }

    /// Number of indices currently owned
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
