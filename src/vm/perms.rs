// SPDX-License-Identifier: MPL-2.0

use bitflags::bitflags;

bitflags! {
    /// The access permission of a resident page.
    ///
    /// `empty()` means no access: the mapping stays installed but every
    /// access re-raises a fault. The second-chance sweep demotes frames to
    /// this state to re-arm their reference bits.
    pub struct PagePerm: u8 {
        /// Readable.
        const R = 1 << 0;
        /// Writable.
        const W = 1 << 1;
        /// Readable + writable.
        const RW = Self::R.bits | Self::W.bits;
    }
}
