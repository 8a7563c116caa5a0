//! Binding-point allocation for uniform blocks.
//!
//! The hardware exposes a fixed number of uniform-buffer binding points. The
//! [`BindingPointAllocator`] partitions them into one pool per
//! [`BlockCategory`]:
//!
//! ```text
//! | Intrinsic | Global | Regular ... | Instance ... |
//! 0           4        8
//! ```
//!
//! Intrinsic and Global get a fixed quota each ([`BindingQuotas`]); the
//! remainder is split evenly between Regular and Instance, leaving the odd
//! slot unused.
//!
//! Slots are assigned by block name and never reclaimed. Registering a block
//! name that already has a slot (typically from another program using the
//! same block) binds the new program's block to that same slot, so a single
//! device buffer serves every program that declares the block.
//!
//! # Example
//!
//! ```ignore
//! let mut allocator = BindingPointAllocator::new(
//!     backend.max_uniform_buffer_bindings(),
//!     BindingQuotas::default(),
//! );
//!
//! let slot = allocator.register_block(&mut backend, program, "Camera_Intrinsic", BlockCategory::Intrinsic)?;
//! allocator.connect_buffer_to_block(&mut backend, buffer, "Camera_Intrinsic", BlockCategory::Intrinsic, None)?;
//! ```

use std::collections::HashMap;

use crate::backend::{BufferHandle, GpuBackend, ProgramHandle};
use crate::error::{BindingError, GraphicsError};
use crate::types::BufferRange;
use crate::uniform::BlockCategory;

/// Fixed slot quotas for the Intrinsic and Global pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingQuotas {
    pub intrinsic: u32,
    pub global: u32,
}

impl BindingQuotas {
    /// Default quota of each fixed pool.
    pub const DEFAULT_QUOTA: u32 = 4;

    /// Create quotas with the default of 4 slots each.
    pub fn new() -> Self {
        Self {
            intrinsic: Self::DEFAULT_QUOTA,
            global: Self::DEFAULT_QUOTA,
        }
    }

    /// Set the Intrinsic quota.
    pub fn with_intrinsic(mut self, slots: u32) -> Self {
        self.intrinsic = slots;
        self
    }

    /// Set the Global quota.
    pub fn with_global(mut self, slots: u32) -> Self {
        self.global = slots;
        self
    }
}

impl Default for BindingQuotas {
    fn default() -> Self {
        Self::new()
    }
}

/// The slots of one category.
///
/// Slots are handed out sequentially from `start`; the name map is
/// append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlotPool {
    start: u32,
    maximum: u32,
    slots: HashMap<String, u32>,
}

impl BindingSlotPool {
    fn new(start: u32, maximum: u32) -> Self {
        Self {
            start,
            maximum,
            slots: HashMap::new(),
        }
    }

    /// First hardware slot of the pool.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of slots in the pool.
    pub fn capacity(&self) -> u32 {
        self.maximum
    }

    /// Number of slots already assigned.
    pub fn in_use(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Whether every slot is assigned.
    pub fn is_full(&self) -> bool {
        self.in_use() >= self.maximum
    }

    /// Slot assigned to `block`.
    pub fn slot_of(&self, block: &str) -> Option<u32> {
        self.slots.get(block).copied()
    }

    /// Every assigned `(block, slot)` pair, in slot order.
    pub fn assignments(&self) -> Vec<(&str, u32)> {
        let mut assignments: Vec<(&str, u32)> =
            self.slots.iter().map(|(n, &s)| (n.as_str(), s)).collect();
        assignments.sort_by_key(|&(_, slot)| slot);
        assignments
    }

    fn assign(&mut self, block: &str) -> Option<u32> {
        if self.is_full() {
            return None;
        }
        let slot = self.start + self.in_use();
        self.slots.insert(block.to_string(), slot);
        Some(slot)
    }
}

/// Assigns uniform-block binding points per [`BlockCategory`].
///
/// One allocator exists per graphics context; see
/// [`GraphicsResourceContext`](crate::context::GraphicsResourceContext).
#[derive(Debug, Clone)]
pub struct BindingPointAllocator {
    max_bindings: u32,
    pools: [BindingSlotPool; 4],
}

impl BindingPointAllocator {
    /// Partition `max_bindings` hardware slots.
    ///
    /// Quotas larger than what is left are clamped, so a small device gets
    /// fewer (possibly zero) Regular and Instance slots instead of overlapping
    /// pools.
    pub fn new(max_bindings: u32, quotas: BindingQuotas) -> Self {
        let intrinsic = quotas.intrinsic.min(max_bindings);
        let global = quotas.global.min(max_bindings - intrinsic);
        let shared = (max_bindings - intrinsic - global) / 2;

        let regular_start = intrinsic + global;
        let pools = [
            BindingSlotPool::new(regular_start, shared),
            BindingSlotPool::new(intrinsic, global),
            BindingSlotPool::new(0, intrinsic),
            BindingSlotPool::new(regular_start + shared, shared),
        ];

        log::debug!(
            "Binding points: {max_bindings} total, intrinsic {intrinsic}, global {global}, \
             regular {shared}, instance {shared}"
        );

        Self {
            max_bindings,
            pools,
        }
    }

    /// Hardware slot count the allocator was built for.
    pub fn max_bindings(&self) -> u32 {
        self.max_bindings
    }

    /// The pool of `category`.
    pub fn pool(&self, category: BlockCategory) -> &BindingSlotPool {
        &self.pools[category.index()]
    }

    /// Slot assigned to `block` in `category`.
    pub fn slot_of(&self, block: &str, category: BlockCategory) -> Option<u32> {
        self.pool(category).slot_of(block)
    }

    /// Give `block` of `program` a binding point and bind it.
    ///
    /// A block name that already has a slot keeps it; the new program's block
    /// is bound to the existing slot. Fails with
    /// [`BindingError::PoolExhausted`] when the category has no free slot, in
    /// which case nothing is recorded.
    pub fn register_block<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        program: ProgramHandle,
        block: &str,
        category: BlockCategory,
    ) -> Result<u32, GraphicsError> {
        let pool = &mut self.pools[category.index()];

        let slot = match pool.slot_of(block) {
            Some(slot) => slot,
            None => {
                let slot = pool.assign(block).ok_or_else(|| BindingError::PoolExhausted {
                    category,
                    block: block.to_string(),
                    capacity: pool.capacity(),
                })?;
                log::debug!("Assigned {category} binding point {slot} to block '{block}'");
                slot
            }
        };

        backend.bind_block_to_slot(program, block, slot)?;
        Ok(slot)
    }

    /// Bind `buffer` (or a range of it) to the slot of `block`.
    ///
    /// The block must have been registered first.
    pub fn connect_buffer_to_block<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        buffer: BufferHandle,
        block: &str,
        category: BlockCategory,
        range: Option<BufferRange>,
    ) -> Result<u32, GraphicsError> {
        let slot = self
            .slot_of(block, category)
            .ok_or_else(|| BindingError::BlockNotRegistered {
                category,
                block: block.to_string(),
            })?;

        backend.bind_buffer_to_slot(buffer, slot, range)?;
        Ok(slot)
    }
}
