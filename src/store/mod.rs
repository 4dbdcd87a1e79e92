//! Preallocated surfel store.
//!
//! Surfel records live in one contiguous arena addressed by `u32` handles.
//! The spatial index stores handles only (never surfel data), so the two
//! structures can be kept consistent behind the mapper façade.

use crate::core::Surfel;
use crate::error::MapperError;

/// Arena of surfel records with stable indices.
///
/// Capacity is fixed at construction (`scene_size`); allocation advances a
/// cursor and never moves existing records. Indices stay valid until
/// [`SurfelStore::reset`].
#[derive(Clone, Debug)]
pub struct SurfelStore {
    surfels: Vec<Surfel>,
    capacity: usize,
}

impl SurfelStore {
    /// Create an empty store that can hold up to `capacity` surfels.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            surfels: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of surfels the store can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of allocated records (live and invalidated alike).
    #[inline]
    pub fn len(&self) -> usize {
        self.surfels.len()
    }

    /// True when nothing has been allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.surfels.is_empty()
    }

    /// True when allocation would fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.surfels.len() >= self.capacity
    }

    /// Allocate a slot for `surfel` and return its index.
    pub fn allocate(&mut self, surfel: Surfel) -> Result<u32, MapperError> {
        if self.is_full() {
            return Err(MapperError::OutOfCapacity {
                capacity: self.capacity,
            });
        }
        let index = self.surfels.len() as u32;
        self.surfels.push(surfel);
        Ok(index)
    }

    /// Shared access to a record.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&Surfel> {
        self.surfels.get(index as usize)
    }

    /// Mutable access to a record.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut Surfel> {
        self.surfels.get_mut(index as usize)
    }

    /// Overwrite a record with the invalid sentinel.
    ///
    /// Store side only: the caller must ensure the spatial index no longer
    /// references `index`.
    pub fn mark_invalid(&mut self, index: u32) {
        if let Some(slot) = self.surfels.get_mut(index as usize) {
            *slot = Surfel::invalid();
        }
    }

    /// Iterate all allocated records with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Surfel)> {
        self.surfels
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s))
    }

    /// Drop every record. Capacity is retained; indices restart at zero.
    pub fn reset(&mut self) {
        self.surfels.clear();
    }
}
