//! Physical and numerical constants used throughout the espfit library.
//!
//! All internal lengths are in bohr. User-facing lengths (cutoffs and switching
//! radii given on the command line or in a configuration file) are in
//! angstrom and are converted exactly once, at the boundary.

/// Conversion factor from bohr radii to angstroms.
pub const BOHR_TO_ANGSTROM: f64 = 0.529_177_210_903;

/// Length of one angstrom in bohr.
pub const ANGSTROM: f64 = 1.0 / BOHR_TO_ANGSTROM;

/// Distances below this value (in bohr) are treated as coincident points.
pub const DISTANCE_THRESHOLD_BOHR: f64 = 1e-12;

/// Two over the square root of pi, the r -> 0 limit factor of erf(ar)/r.
pub const TWO_OVER_SQRT_PI: f64 = std::f64::consts::FRAC_2_SQRT_PI;
