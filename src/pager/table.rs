// SPDX-License-Identifier: MPL-2.0

//! The frame table and the block table.
//!
//! Both model a bounded pool of page slots: the frame table stands for main
//! memory, the block table for the backing store. Descriptors record which
//! `(pid, vaddr)` a slot backs; lookups are linear scans over the fixed slot
//! array.

use crate::vm::{perms::PagePerm, Pid, Vaddr};

/// A frame slot descriptor: the resident page and its access state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameDesc {
    pub pid: Pid,
    pub vaddr: Vaddr,
    pub perm: PagePerm,
    /// Set on every fault that finds the page already resident; cleared by
    /// second-chance sweeps.
    pub referenced: bool,
    /// Whether the page was ever written. Decides write-back at eviction.
    pub dirty: bool,
}

impl FrameDesc {
    pub fn new(pid: Pid, vaddr: Vaddr, perm: PagePerm) -> Self {
        Self {
            pid,
            vaddr,
            perm,
            referenced: false,
            dirty: false,
        }
    }
}

/// A block slot descriptor: a swapped-out page and its sticky dirty bit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockDesc {
    pub pid: Pid,
    pub vaddr: Vaddr,
    pub dirty: bool,
}

/// The model of main memory: a fixed array of frame slots.
pub(crate) struct FrameTable {
    slots: Vec<Option<FrameDesc>>,
    nr_free: usize,
}

impl FrameTable {
    pub fn new(nframes: usize) -> Self {
        assert!(nframes > 0, "the frame pool cannot be empty");
        Self {
            slots: vec![None; nframes],
            nr_free: nframes,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn nr_free(&self) -> usize {
        self.nr_free
    }

    /// Finds the slot backing `(pid, vaddr)`.
    pub fn lookup(&self, pid: Pid, vaddr: Vaddr) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(desc) if desc.pid == pid && desc.vaddr == vaddr))
    }

    /// Places `desc` into the lowest-index free slot, or fails when the
    /// table is full.
    pub fn insert(&mut self, desc: FrameDesc) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(desc);
        self.nr_free -= 1;
        Some(slot)
    }

    pub fn get(&self, slot: usize) -> Option<&FrameDesc> {
        self.slots[slot].as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut FrameDesc> {
        self.slots[slot].as_mut()
    }

    /// Clears the slot, returning its descriptor.
    pub fn take(&mut self, slot: usize) -> Option<FrameDesc> {
        let desc = self.slots[slot].take();
        if desc.is_some() {
            self.nr_free += 1;
        }
        desc
    }

    /// Clears every slot owned by `pid`.
    pub fn evict_all(&mut self, pid: Pid) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(desc) if desc.pid == pid) {
                *slot = None;
                self.nr_free += 1;
            }
        }
    }
}

/// The model of the backing store: a fixed array of block slots plus a
/// reservation counter.
///
/// Every extended page holds one reservation for its entire lifetime,
/// whether or not it currently occupies a slot. Occupied slots therefore
/// never exceed reservations, and a spill is always guaranteed a free slot.
pub(crate) struct BlockTable {
    slots: Vec<Option<BlockDesc>>,
    nr_reserved: usize,
}

impl BlockTable {
    pub fn new(nblocks: usize) -> Self {
        Self {
            slots: vec![None; nblocks],
            nr_reserved: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// The number of reservations still available to `extend`.
    pub fn nr_free(&self) -> usize {
        self.slots.len() - self.nr_reserved
    }

    /// Takes one reservation; fails when every slot is already promised.
    pub fn reserve(&mut self) -> bool {
        if self.nr_reserved == self.slots.len() {
            return false;
        }
        self.nr_reserved += 1;
        true
    }

    /// Returns `count` reservations.
    pub fn release(&mut self, count: usize) {
        debug_assert!(count <= self.nr_reserved);
        self.nr_reserved -= count;
    }

    /// Finds the slot backing `(pid, vaddr)`.
    pub fn lookup(&self, pid: Pid, vaddr: Vaddr) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(desc) if desc.pid == pid && desc.vaddr == vaddr))
    }

    /// Places `desc` into slot `preferred` when free, otherwise into the
    /// lowest-index free slot. The page must hold a reservation.
    pub fn place(&mut self, preferred: usize, desc: BlockDesc) -> usize {
        let slot = if preferred < self.slots.len() && self.slots[preferred].is_none() {
            preferred
        } else {
            self.slots
                .iter()
                .position(Option::is_none)
                .expect("a reserved page found no free block slot")
        };
        self.slots[slot] = Some(desc);
        slot
    }

    pub fn get(&self, slot: usize) -> Option<&BlockDesc> {
        self.slots[slot].as_ref()
    }

    /// Clears the slot, returning its descriptor. The reservation stays
    /// with the page.
    pub fn take(&mut self, slot: usize) -> Option<BlockDesc> {
        self.slots[slot].take()
    }

    /// Clears every slot owned by `pid`. Reservations are returned
    /// separately, through [`Self::release`].
    pub fn evict_all(&mut self, pid: Pid) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(desc) if desc.pid == pid) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vm::{perms::PagePerm, Vaddr};

    fn vaddr(index: usize) -> Vaddr {
        Vaddr::from_page_index(index)
    }

    #[test]
    fn insert_takes_lowest_free_slot() {
        let mut frames = FrameTable::new(3);
        assert_eq!(frames.insert(FrameDesc::new(1, vaddr(0), PagePerm::R)), Some(0));
        assert_eq!(frames.insert(FrameDesc::new(1, vaddr(1), PagePerm::R)), Some(1));
        frames.take(0);
        assert_eq!(frames.insert(FrameDesc::new(2, vaddr(0), PagePerm::R)), Some(0));
        assert_eq!(frames.insert(FrameDesc::new(2, vaddr(1), PagePerm::R)), Some(2));
        assert_eq!(frames.insert(FrameDesc::new(2, vaddr(2), PagePerm::R)), None);
    }

    #[test]
    fn lookup_matches_owner_and_address() {
        let mut frames = FrameTable::new(2);
        frames.insert(FrameDesc::new(1, vaddr(0), PagePerm::R));
        frames.insert(FrameDesc::new(2, vaddr(0), PagePerm::R));
        assert_eq!(frames.lookup(1, vaddr(0)), Some(0));
        assert_eq!(frames.lookup(2, vaddr(0)), Some(1));
        assert_eq!(frames.lookup(1, vaddr(1)), None);
    }

    #[test]
    fn evict_all_only_clears_the_owner() {
        let mut frames = FrameTable::new(3);
        frames.insert(FrameDesc::new(1, vaddr(0), PagePerm::R));
        frames.insert(FrameDesc::new(2, vaddr(0), PagePerm::R));
        frames.insert(FrameDesc::new(1, vaddr(1), PagePerm::R));
        frames.evict_all(1);
        assert_eq!(frames.nr_free(), 2);
        assert_eq!(frames.lookup(2, vaddr(0)), Some(1));
        assert_eq!(frames.lookup(1, vaddr(0)), None);
    }

    #[test]
    fn reservations_are_bounded_by_the_pool() {
        let mut blocks = BlockTable::new(2);
        assert!(blocks.reserve());
        assert!(blocks.reserve());
        assert!(!blocks.reserve());
        blocks.release(1);
        assert!(blocks.reserve());
        assert_eq!(blocks.nr_free(), 0);
    }

    #[test]
    fn place_prefers_the_given_slot() {
        let mut blocks = BlockTable::new(3);
        blocks.reserve();
        blocks.reserve();
        let desc = BlockDesc {
            pid: 1,
            vaddr: vaddr(0),
            dirty: false,
        };
        assert_eq!(blocks.place(2, desc), 2);
        // The preferred slot is taken, so the lowest free one wins.
        let desc = BlockDesc {
            pid: 1,
            vaddr: vaddr(1),
            dirty: true,
        };
        assert_eq!(blocks.place(2, desc), 0);
        assert!(blocks.get(0).unwrap().dirty);
    }
}
