//! Linear-probing building blocks shared by the key store and the map.
//!
//! Both tables keep entries directly in a power-of-two array of slots and
//! probe forward from `spread(hash) & mask`. Deletion uses backward shift
//! instead of tombstones: after a slot is cleared, later entries in the same
//! cluster are pulled back into the hole whenever that keeps them reachable
//! from their home slot.

use crate::error::{Error, Result};
use crate::hash;

/// Smallest accepted load factor.
pub const MIN_LOAD_FACTOR: f32 = 1.0 / 65536.0;

/// Hash table construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    /// Slots allocated up front; rounded up to a power of two.
    pub initial_capacity: usize,
    /// Occupancy fraction in `[MIN_LOAD_FACTOR, 1)` above which the table
    /// grows. A factor small enough that doubling once still leaves the size
    /// over the limit grows by as many doublings as needed in one rehash.
    pub load_factor: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 8,
            load_factor: 0.5,
        }
    }
}

impl TableConfig {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Validate and return the rounded initial capacity.
    pub(crate) fn capacity(&self) -> Result<usize> {
        if !(self.load_factor >= MIN_LOAD_FACTOR && self.load_factor < 1.0) {
            return Err(Error::config(format!(
                "load factor {} outside [{MIN_LOAD_FACTOR}, 1)",
                self.load_factor
            )));
        }
        if self.initial_capacity > 1 << 30 {
            return Err(Error::config(format!(
                "initial capacity {} too large",
                self.initial_capacity
            )));
        }
        Ok(hash::next_power_of_two(self.initial_capacity))
    }
}

/// Largest size a table of `capacity` slots may hold before doubling.
#[inline]
pub(crate) fn resize_limit(capacity: usize, load_factor: f32) -> usize {
    (capacity as f64 * load_factor as f64) as usize
}

/// Capacity to rehash into once `len` has passed the limit of `capacity`:
/// the first doubling whose limit holds `len`.
pub(crate) fn grown_capacity(capacity: usize, len: usize, load_factor: f32) -> usize {
    let mut grown = capacity * 2;
    while len > resize_limit(grown, load_factor) {
        grown *= 2;
    }
    grown
}

/// Whether `hole` lies on the probe path from `home` up to (not including)
/// `slot`, walking forward cyclically.
///
/// An entry sitting in `slot` may move into `hole` exactly when this holds.
#[inline]
pub fn in_probe_range(home: usize, hole: usize, slot: usize, mask: usize) -> bool {
    hole.wrapping_sub(home) & mask < slot.wrapping_sub(home) & mask
}

/// Slot array operations needed by [`backward_shift`].
pub trait Slots {
    /// Number of slots; a power of two.
    fn capacity(&self) -> usize;

    fn is_vacant(&self, slot: usize) -> bool;

    /// Home slot of the entry stored in occupied `slot`.
    fn home(&self, slot: usize) -> usize;

    /// Move the entry in `from` into vacant `to`, leaving `from` vacant.
    fn relocate(&mut self, from: usize, to: usize);
}

/// Close the hole at `hole` (already vacant) by shifting later entries of the
/// cluster back. Stops at the first vacant slot.
pub fn backward_shift<T: Slots + ?Sized>(table: &mut T, mut hole: usize) {
    let mask = table.capacity() - 1;
    let mut slot = hole;
    loop {
        slot = (slot + 1) & mask;
        if table.is_vacant(slot) {
            return;
        }
        let home = table.home(slot);
        if in_probe_range(home, hole, slot, mask) {
            table.relocate(slot, hole);
            hole = slot;
        }
    }
}

/// Whether every occupied slot is reachable by probing forward from its home
/// without crossing a vacant slot.
pub fn all_reachable<T: Slots + ?Sized>(table: &T) -> bool {
    let mask = table.capacity() - 1;
    (0..table.capacity())
        .filter(|&slot| !table.is_vacant(slot))
        .all(|slot| {
            let mut probe = table.home(slot);
            while probe != slot {
                if table.is_vacant(probe) {
                    return false;
                }
                probe = (probe + 1) & mask;
            }
            true
        })
}
