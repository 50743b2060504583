//! Access-mode algebra.
//!
//! Every argument of a loop declares how the kernel touches its data. When several
//! loops are merged into one fused unit, the modes of arguments that name the same
//! data are folded with [`Access::merge`] to give the fused unit's visible access.

/// How a kernel touches one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter, strum::VariantArray)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Access {
    Read,
    Write,
    #[strum(serialize = "RW")]
    RW,
    Inc,
    Min,
    Max,
}

impl Access {
    /// Combine the modes of two accesses to the same data.
    ///
    /// Identical modes merge to themselves. Otherwise a read on either side turns the
    /// result into `RW` (or stays a read when both sides read), any `WRITE` paired with
    /// a non-read mode wins, and the remaining pairs of distinct write-like modes fall
    /// back to `RW`.
    pub fn merge(self, other: Access) -> Access {
        use Access::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Read, _) | (_, Read) => RW,
            (Write, _) | (_, Write) => Write,
            _ => RW,
        }
    }

    pub fn is_read_only(self) -> bool {
        self == Access::Read
    }

    /// Part of the read-set: `READ` or `RW`.
    pub fn reads(self) -> bool {
        matches!(self, Access::Read | Access::RW)
    }

    /// Part of the write-set: anything but `READ`.
    pub fn writes(self) -> bool {
        !self.is_read_only()
    }

    /// Reduction modes that combine with the previous value.
    pub fn is_reduction(self) -> bool {
        matches!(self, Access::Inc | Access::Min | Access::Max)
    }
}
