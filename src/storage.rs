//! Sparse quantum storage.
//!
//! A device's bytes live in a singly linked chain of quantum-sets. Each
//! quantum-set is a table of `qset` slots, and each slot optionally holds one
//! quantum: a page-aligned, zero-filled block of `PAGE_SIZE << order` bytes.
//! Nodes, slot tables and quanta are all created lazily, so regions that were
//! never written cost nothing and read back as holes.
//!
//! # Components
//!
//! - [`Store`] - The chain of one device, its logical size and its geometry
//! - [`QuantumSet`] - One chain node
//! - [`Quantum`] - One block of memory
//! - [`QuantumAllocator`] - Allocation, budgeting and recycling of quanta
//! - [`MemoryBudget`] - Byte limit shared by an allocator's quanta
//! - [`Geometry`] - Offset arithmetic for a given order and capacity
//!
//! # Offset arithmetic
//!
//! With `block_size = PAGE_SIZE << order` and `item_size = block_size * qset`,
//! a linear offset splits into the chain node `offset / item_size`, the slot
//! `(offset % item_size) / block_size` and the offset within the quantum.
//!
//! ```
//! use quantadev::storage::{Geometry, Location};
//!
//! let geometry = Geometry::new(0, 2);
//! let loc = geometry.locate(3 * 4096 + 10);
//! assert_eq!(loc, Location { item: 1, slot: 1, offset: 10 });
//! assert_eq!(geometry.linear(&loc), 3 * 4096 + 10);
//! ```

mod allocator;
mod budget;
mod chain;
mod error;
mod geometry;
mod quantum;

pub use allocator::QuantumAllocator;
pub use budget::{MemoryBudget, MemoryPermit};
pub use chain::{QuantumSet, Store};
pub use error::StorageError;
pub use geometry::{Geometry, Location};
pub use quantum::Quantum;

#[cfg(test)]
mod tests;
