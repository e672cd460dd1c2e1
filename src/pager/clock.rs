// SPDX-License-Identifier: MPL-2.0

//! Second-chance replacement.

use super::table::FrameTable;
use crate::{mmu::Mmu, prelude::*, vm::perms::PagePerm};

/// The clock hand of the second-chance policy.
///
/// The hand persists across evictions and advances only while a victim is
/// being selected, so every frame gets one free pass per sweep.
pub(crate) struct ClockHand {
    pos: usize,
}

impl ClockHand {
    pub fn new() -> Self {
        Self { pos: 0 }
    }

    /// Selects a victim frame slot, leaving the hand on the slot after it.
    ///
    /// A referenced frame spends its second chance: the reference bit is
    /// cleared and the permission demoted to no-access through the MMU, so
    /// the next access re-faults and re-arms the bit. The first
    /// unreferenced slot met is the victim. When every frame is referenced
    /// the first sweep clears them all and the second finds a victim, for a
    /// worst case of 2·F inspections.
    pub fn find_victim<M: Mmu>(&mut self, frames: &mut FrameTable, mmu: &mut M) -> usize {
        loop {
            if self.pos >= frames.len() {
                self.pos = 0;
            }
            let slot = self.pos;
            self.pos += 1;
            let Some(desc) = frames.get_mut(slot) else {
                // An empty slot needs no second chance.
                return slot;
            };
            if !desc.referenced {
                return slot;
            }
            desc.referenced = false;
            desc.perm = PagePerm::empty();
            trace!("clock: demote pid {} at {:?}", desc.pid, desc.vaddr);
            mmu.chprot(desc.pid, desc.vaddr, PagePerm::empty());
        }
    }
}
