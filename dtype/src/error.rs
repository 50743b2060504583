use snafu::Snafu;

use crate::DType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Two storages of different element types were combined.
    #[snafu(display("dtype mismatch: expected {expected}, got {actual}"))]
    DTypeMismatch { expected: DType, actual: DType },

    /// Element count does not match the expected count.
    #[snafu(display("length mismatch: expected {expected} elements, got {actual}"))]
    LengthMismatch { expected: usize, actual: usize },

    /// Row index outside the storage.
    #[snafu(display("row {row} out of bounds for storage with {rows} rows of width {dim}"))]
    RowOutOfBounds { row: usize, rows: usize, dim: usize },

    /// Byte image has a size that is not a multiple of the element size.
    #[snafu(display("byte length {len} is not a multiple of {dtype} element size"))]
    MisalignedBytes { len: usize, dtype: DType },
}
