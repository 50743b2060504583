//! Typed host storage.
//!
//! [`Storage`] is a dense, row-major vector of one element type. Rows are `dim`
//! elements wide; the reference executor gathers rows into small per-entity
//! storages, hands them to a kernel, and scatters the results back.

use snafu::ensure;

use crate::error::{DTypeMismatchSnafu, LengthMismatchSnafu, MisalignedBytesSnafu, Result, RowOutOfBoundsSnafu};
use crate::{DType, HasDType};

#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! dispatch {
    ($storage:expr, $values:ident => $body:expr) => {
        match $storage {
            Storage::Int32($values) => $body,
            Storage::UInt32($values) => $body,
            Storage::Int64($values) => $body,
            Storage::Float32($values) => $body,
            Storage::Float64($values) => $body,
        }
    };
}

macro_rules! dispatch_map {
    ($storage:expr, $values:ident => $body:expr) => {
        match $storage {
            Storage::Int32($values) => Storage::Int32($body),
            Storage::UInt32($values) => Storage::UInt32($body),
            Storage::Int64($values) => Storage::Int64($body),
            Storage::Float32($values) => Storage::Float32($body),
            Storage::Float64($values) => Storage::Float64($body),
        }
    };
}

macro_rules! zip_dispatch {
    ($lhs:expr, $rhs:expr, $dst:ident, $src:ident => $body:expr, else $fallback:expr) => {
        match ($lhs, $rhs) {
            (Storage::Int32($dst), Storage::Int32($src)) => $body,
            (Storage::UInt32($dst), Storage::UInt32($src)) => $body,
            (Storage::Int64($dst), Storage::Int64($src)) => $body,
            (Storage::Float32($dst), Storage::Float32($src)) => $body,
            (Storage::Float64($dst), Storage::Float64($src)) => $body,
            _ => $fallback,
        }
    };
}

macro_rules! decode_le {
    ($bytes:expr, $ty:ty, $width:literal) => {
        $bytes.chunks_exact($width).map(|chunk| <$ty>::from_le_bytes(std::array::from_fn(|i| chunk[i]))).collect()
    };
}

impl Storage {
    /// Zero-filled storage of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Int32 => Self::Int32(vec![0; len]),
            DType::UInt32 => Self::UInt32(vec![0; len]),
            DType::Int64 => Self::Int64(vec![0; len]),
            DType::Float32 => Self::Float32(vec![0.0; len]),
            DType::Float64 => Self::Float64(vec![0.0; len]),
        }
    }

    pub fn from_vec<T: HasDType>(values: Vec<T>) -> Self {
        T::wrap(values)
    }

    pub fn from_slice<T: HasDType>(values: &[T]) -> Self {
        T::wrap(values.to_vec())
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::Int32(_) => DType::Int32,
            Self::UInt32(_) => DType::UInt32,
            Self::Int64(_) => DType::Int64,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view; `None` when `T` is not the stored element type.
    pub fn as_slice<T: HasDType>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn as_mut_slice<T: HasDType>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }

    pub fn to_vec<T: HasDType>(&self) -> Option<Vec<T>> {
        self.as_slice().map(<[T]>::to_vec)
    }

    /// Concatenate `rows` (each `dim` elements wide) into a new storage.
    ///
    /// Rows may repeat; the result then holds one copy per occurrence.
    pub fn gather(&self, rows: &[usize], dim: usize) -> Result<Storage> {
        self.check_rows(rows, dim)?;
        Ok(dispatch_map!(self, values => {
            rows.iter().flat_map(|&row| values[row * dim..(row + 1) * dim].iter().copied()).collect()
        }))
    }

    /// Write `src` back over `rows`, the inverse of [`Storage::gather`].
    ///
    /// Repeated rows are written in order, so the last occurrence wins.
    pub fn scatter(&mut self, rows: &[usize], dim: usize, src: &Storage) -> Result<()> {
        ensure!(self.dtype() == src.dtype(), DTypeMismatchSnafu { expected: self.dtype(), actual: src.dtype() });
        ensure!(src.len() == rows.len() * dim, LengthMismatchSnafu { expected: rows.len() * dim, actual: src.len() });
        self.check_rows(rows, dim)?;

        zip_dispatch!(self, src, dst, values => {
            for (slot, &row) in rows.iter().enumerate() {
                dst[row * dim..(row + 1) * dim].copy_from_slice(&values[slot * dim..(slot + 1) * dim]);
            }
            Ok(())
        }, else unreachable!("dtype equality checked above"))
    }

    /// Overwrite every element with `src`.
    pub fn copy_from(&mut self, src: &Storage) -> Result<()> {
        ensure!(self.dtype() == src.dtype(), DTypeMismatchSnafu { expected: self.dtype(), actual: src.dtype() });
        ensure!(self.len() == src.len(), LengthMismatchSnafu { expected: self.len(), actual: src.len() });
        zip_dispatch!(self, src, dst, values => {
            dst.copy_from_slice(values);
            Ok(())
        }, else unreachable!("dtype equality checked above"))
    }

    /// Little-endian byte image, the layout used by device buffers.
    pub fn to_bytes(&self) -> Vec<u8> {
        dispatch!(self, values => values.iter().flat_map(|value| value.to_le_bytes()).collect())
    }

    pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() % dtype.bytes() == 0, MisalignedBytesSnafu { len: bytes.len(), dtype });
        Ok(match dtype {
            DType::Int32 => Self::Int32(decode_le!(bytes, i32, 4)),
            DType::UInt32 => Self::UInt32(decode_le!(bytes, u32, 4)),
            DType::Int64 => Self::Int64(decode_le!(bytes, i64, 8)),
            DType::Float32 => Self::Float32(decode_le!(bytes, f32, 4)),
            DType::Float64 => Self::Float64(decode_le!(bytes, f64, 8)),
        })
    }

    fn check_rows(&self, rows: &[usize], dim: usize) -> Result<()> {
        ensure!(dim > 0 && self.len() % dim == 0, LengthMismatchSnafu { expected: dim, actual: self.len() });
        let total = self.len() / dim;
        if let Some(&row) = rows.iter().find(|&&row| row >= total) {
            return RowOutOfBoundsSnafu { row, rows: total, dim }.fail();
        }
        Ok(())
    }
}
