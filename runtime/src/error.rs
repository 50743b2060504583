//! Error types for loop execution.

use snafu::Snafu;
use tessel_ir::KernelError;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while building or running kernels.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Authority transition or guarded host access failed.
    #[snafu(display("Data access error: {source}"))]
    Device { source: tessel_device::Error },

    /// Gathering or scattering argument rows failed.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: tessel_dtype::Error },

    /// A kernel call failed; fatal for the enclosing chain.
    #[snafu(display("Kernel '{kernel}' failed at entity {entity}: {source}"))]
    Kernel { kernel: String, entity: usize, source: KernelError },

    /// Extruded iteration is not supported by the reference executor.
    #[snafu(display("Layered set '{set}' is not supported by the reference executor"))]
    LayeredSetUnsupported { set: String },

    /// Code generation failed.
    #[snafu(display("Code generation failed for '{kernel}': {reason}"))]
    CodeGeneration { kernel: String, reason: String },

    /// Native compilation or loading failed. Not retried.
    #[snafu(display("Compilation failed for '{kernel}': {reason}"))]
    Compilation { kernel: String, reason: String },

    /// A plan step names a loop the chain does not have.
    #[snafu(display("Plan step references loop {index}, chain has {loops}"))]
    PlanLoopOutOfRange { index: usize, loops: usize },

    /// A plan step names an iteration past the loop's domain.
    #[snafu(display("Plan step visits iteration {iteration} of loop '{kernel}', domain has {len}"))]
    PlanIterationOutOfRange { kernel: String, iteration: usize, len: usize },
}
