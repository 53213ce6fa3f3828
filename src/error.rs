use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all fallible operations in the `espfit` library.
///
/// Every variant describes a condition that aborts the current run. A singular
/// cost matrix is not an error; it shows up as the zero condition number of
/// [`crate::diagnostics::condition_number`].
#[derive(Error, Debug)]
pub enum EspError {
    /// Two arrays that must describe the same grid have different lengths.
    ///
    /// Also used when a vector of unknowns or charges does not match the size
    /// of a cost model, and when stored matrices do not fit together.
    #[error("Length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        /// Which array had the wrong length.
        what: &'static str,
        /// The length dictated by the grid.
        expected: usize,
        /// The length that was supplied.
        found: usize,
    },

    /// All weights are zero after combining the weighting criteria, so there
    /// are no usable grid points left to fit against.
    #[error("No points with a non-zero weight were found")]
    ZeroTotalWeight,

    /// A weighting criterion was constructed with out-of-range parameters.
    ///
    /// Typical causes are a non-positive switching width, a negative radius or
    /// a negative or non-finite weight handed to the assembler.
    #[error("Invalid weighting criterion: {0}")]
    InvalidCriterion(String),

    /// A textual weighting specification could not be parsed.
    ///
    /// Raised at the program boundary, before any data is loaded, for strings
    /// such as `8:abc` that do not follow the `--wdens`, `--wnear` or `--wfar`
    /// grammar.
    #[error("Invalid weighting specification '{spec}': {details}")]
    InvalidSpec {
        /// The offending input string.
        spec: String,
        /// What was wrong with it.
        details: String,
    },

    /// The Ewald splitting parameters are not strictly positive and finite.
    ///
    /// The message names the offending parameter and its value.
    #[error("Invalid splitting parameters: {0}")]
    InvalidSplitting(String),

    /// The grid geometry is unusable, e.g. degenerate grid vectors.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Only fully periodic or fully isolated grids are supported.
    #[error("Unsupported number of periodic directions: {0} (expected 0 or 3)")]
    UnsupportedPeriodicity(usize),

    /// A periodic grid cannot be sub-sampled with a stride that does not
    /// divide every axis, since the cell would change.
    #[error("The stride {stride} is not commensurate with the grid shape {shape:?}")]
    IncommensurateStride {
        /// The requested stride.
        stride: usize,
        /// The shape of the grid being reduced.
        shape: [usize; 3],
    },

    /// A grid point with a positive weight coincides with an atom, where the
    /// electrostatic kernel diverges.
    ///
    /// A near-nucleus exclusion for the element of that atom removes such
    /// points from the fit.
    #[error("Grid point {point} with non-zero weight coincides with atom {atom}")]
    SingularGridPoint {
        /// Flat index of the grid point.
        point: usize,
        /// Index of the atom.
        atom: usize,
    },

    /// At least one atom is required to set up a cost function.
    #[error("Input validation failed: at least one atom is required")]
    NoAtoms,

    /// A failure inside the dense linear algebra backend.
    #[error("Linear algebra failure: {0}")]
    Linalg(String),

    /// An I/O error while reading a configuration file.
    ///
    /// The path to the file and the underlying I/O error are provided for
    /// context.
    #[error("I/O error at path '{path}': {source}")]
    IoError {
        /// The path of the file that caused the I/O error.
        path: PathBuf,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// The TOML run configuration could not be deserialized, either because it
    /// is not valid TOML or because it contains unknown or mistyped keys.
    #[error("Failed to deserialize TOML configuration: {0}")]
    DeserializationError(#[from] toml::de::Error),
}
