//! Element types for tessel data arrays.
//!
//! Every `Dat` and `Global` is backed by a [`Storage`], a dense host vector tagged
//! with one of the [`DType`] element types. Kernels see the same storage type, so a
//! dtype check at loop construction is enough to make later element access infallible.

pub mod error;
pub mod ext;
pub mod storage;


pub use error::{Error, Result};
pub use ext::HasDType;
pub use storage::Storage;

/// Element type of a data array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumCount, strum::EnumIter, strum::VariantArray)]
pub enum DType {
    Int32,
    UInt32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt32)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// C spelling of the element type, used when rendering kernel signatures.
    pub const fn c_style(&self) -> &'static str {
        match self {
            Self::Int32 => "int",
            Self::UInt32 => "unsigned int",
            Self::Int64 => "long",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }
}
