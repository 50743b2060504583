use snafu::Snafu;
use tessel_dtype::DType;

use crate::access::Access;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Validation errors raised when building sets, maps, data arrays and loops.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Core (owned, halo-free) region larger than the set.
    #[snafu(display("set '{name}': core size {core_size} exceeds size {size}"))]
    CoreSizeExceedsSize { name: String, core_size: usize, size: usize },

    #[snafu(display("set '{name}': layer count must be positive"))]
    ZeroLayers { name: String },

    #[snafu(display("subset of '{name}': index {index} out of range for set of size {size}"))]
    SubsetIndexOutOfRange { name: String, index: usize, size: usize },

    #[snafu(display("map '{name}': arity must be positive"))]
    ZeroArity { name: String },

    #[snafu(display("map '{name}': expected {expected} values, got {actual}"))]
    MapLengthMismatch { name: String, expected: usize, actual: usize },

    #[snafu(display("map '{name}': value {value} at position {position} out of range for target of size {size}"))]
    MapValueOutOfRange { name: String, position: usize, value: usize, size: usize },

    #[snafu(display("'{name}': per-entity dimension must be positive"))]
    ZeroDim { name: String },

    #[snafu(display("'{name}': expected {expected} elements, got {actual}"))]
    DataLengthMismatch { name: String, expected: usize, actual: usize },

    #[snafu(display("map '{map}' targets set '{target}', but dat '{dat}' lives on '{set}'"))]
    MapTargetMismatch { map: String, target: String, dat: String, set: String },

    #[snafu(display("map '{map}': column {index} out of range for arity {arity}"))]
    MapIndexOutOfRange { map: String, index: usize, arity: usize },

    #[snafu(display("kernel '{kernel}': expected {expected} arguments, got {actual}"))]
    ArgCountMismatch { kernel: String, expected: usize, actual: usize },

    #[snafu(display("kernel '{kernel}' argument {position}: expected {expected}, got {actual}"))]
    ParamDTypeMismatch { kernel: String, position: usize, expected: DType, actual: DType },

    #[snafu(display("kernel '{kernel}' argument {position}: expected {expected} elements, got {actual}"))]
    ParamShapeMismatch { kernel: String, position: usize, expected: usize, actual: usize },

    #[snafu(display("kernel '{kernel}' argument {position}: parameter mutability does not fit {access} access"))]
    ParamMutabilityMismatch { kernel: String, position: usize, access: Access },

    #[snafu(display("argument {position}: dat '{dat}' lives on '{dat_set}', loop iterates '{set}'"))]
    DirectSetMismatch { position: usize, dat: String, dat_set: String, set: String },

    #[snafu(display("argument {position}: map '{map}' starts from '{source_set}', loop iterates '{set}'"))]
    MapSourceMismatch { position: usize, map: String, source_set: String, set: String },
}

/// Failures raised from inside a kernel call.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum KernelError {
    /// Kernel tried to mutate a slot bound with READ access.
    #[snafu(display("slot {position} is read-only"))]
    ReadOnlySlot { position: usize },

    #[snafu(display("slot {position} holds {actual}, requested {expected}"))]
    SlotDType { position: usize, expected: DType, actual: DType },

    #[snafu(display("slot {position} holds {actual} elements, parameter expects {expected}"))]
    SlotShape { position: usize, expected: usize, actual: usize },

    #[snafu(display("kernel received {actual} slots, expects {expected}"))]
    SlotCount { expected: usize, actual: usize },

    /// Kernel body reported a failure.
    #[snafu(display("kernel failed: {message}"))]
    Failed { message: String },
}
