use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Failed to copy data between host and device.
    #[snafu(display("copy operation failed: {reason}"))]
    CopyFailed { reason: String },

    /// Device-side access requested before any upload.
    #[snafu(display("no device buffer attached"))]
    NoDeviceBuffer,

    /// Host write attempted while a kernel holds the array read-only.
    #[snafu(display("data array is read-only during the current kernel call"))]
    ReadOnly,

    /// Element-level failure while moving typed data.
    #[snafu(display("storage error: {source}"))]
    Storage { source: tessel_dtype::Error },
}
