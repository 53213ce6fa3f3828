//! Configuration options for the cost-function assembly.
//!
//! The splitting parameters of the electrostatic kernel live in
//! [`crate::ewald::SplittingParameters`]; the options here only change how the
//! unknowns are laid out and how the work is divided.

/// Options for [`super::CostAssembler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    /// Adds a constant potential offset as an extra, last unknown.
    ///
    /// The zero of a periodic reference potential is arbitrary, so fitting
    /// charges to it usually requires a free offset. When enabled, the cost
    /// matrices have one row more than there are atoms.
    pub fit_offset: bool,
    /// Number of grid points handled by one parallel task.
    ///
    /// Partial sums are combined in chunk order, so for a fixed chunk size the
    /// result does not depend on the number of threads.
    pub chunk_size: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            fit_offset: false,
            chunk_size: 4096,
        }
    }
}
