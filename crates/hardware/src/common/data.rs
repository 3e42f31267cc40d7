//! Memory Request Types.
//!
//! This module defines how requests and line permissions are classified on the memory side.
//! These types are used for the following:
//! 1. **Request Routing:** Distinguishing reads, exclusive reads, and write-backs.
//! 2. **State Grants:** Reporting which coherence state a requester received.
//! 3. **Statistics Tracking:** Categorizing traffic at each level.

use std::fmt;
use std::ops::BitOr;

/// Kind of request travelling towards memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReqType {
    /// Shared read. Issued by loads, instruction fetch and prefetches.
    Gets,

    /// Exclusive read. Issued by stores.
    Getx,

    /// Clean write-back of an evicted line.
    Puts,

    /// Dirty write-back of an evicted line.
    Putx,
}

impl ReqType {
    /// Returns `true` for the two write-back kinds.
    #[inline]
    pub const fn is_writeback(self) -> bool {
        matches!(self, Self::Puts | Self::Putx)
    }
}

impl fmt::Display for ReqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gets => "GETS",
            Self::Getx => "GETX",
            Self::Puts => "PUTS",
            Self::Putx => "PUTX",
        };
        f.write_str(s)
    }
}

/// MESI permission held for a line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineState {
    /// No permission.
    #[default]
    Invalid,
    /// Read permission, possibly shared with other holders.
    Shared,
    /// Sole clean copy.
    Exclusive,
    /// Sole dirty copy.
    Modified,
}

/// Bit flags attached to a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReqFlags(u8);

impl ReqFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Requester cannot take exclusive ownership on a read.
    pub const NO_EXCL: Self = Self(1 << 0);
    /// Request was generated by a prefetcher.
    pub const PREFETCH: Self = Self(1 << 1);
    /// Request is an instruction fetch.
    pub const IFETCH: Self = Self(1 << 2);

    /// Returns `true` when every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ReqFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
