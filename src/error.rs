// SPDX-License-Identifier: MPL-2.0

/// The error type which is returned from the APIs of this crate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// The address lies outside the paged range.
    InvalidAddress,
    /// The process has never been registered.
    NoSuchProcess,
    /// The address lies beyond the process's reserved prefix.
    NotAllocated,
}
