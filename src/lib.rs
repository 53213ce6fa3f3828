//! Weighted least-squares cost functions for fitting atomic point charges to
//! an electrostatic potential (ESP) sampled on a uniform grid.
//!
//! The workflow is: build a [`Weights`] array from zero or more
//! [`WeightCriterion`]s, then let a [`CostAssembler`] reduce the grid into a
//! quadratic [`EspCost`] model `(A, B, C)`. Interactions are evaluated with an
//! Ewald-split kernel so periodic and isolated grids are treated alike. The
//! spectrum of `A` is available through [`ConditionReport`].
//!
//! All lengths are in bohr and all potentials in atomic units.

pub mod config;
pub mod cost;
pub mod diagnostics;
pub mod error;
pub mod ewald;
pub mod grid;
pub mod math;
pub mod observer;
pub mod types;
pub mod weights;

pub use config::RunConfig;
pub use cost::{AssemblyOptions, CostAssembler, EspCost};
pub use diagnostics::{ConditionReport, condition_number, eigenvalues};
pub use error::EspError;
pub use ewald::{ChargeSites, EwaldKernel, Phases, SplittingParameters};
pub use grid::{Cell, GridData, UniformGrid};
pub use observer::{AssemblyEvent, AssemblyObserver};
pub use types::{Atom, AtomView};
pub use weights::{
    DensityCriterion, DensitySpec, FarCriterion, FarSpec, NearCriterion, NearSpec,
    WeightCriterion, WeightSummary, Weights, build_weights,
};
