//! Assembly of the weighted least-squares ESP cost function.
//!
//! The cost of a set of unknowns `x` (atomic charges, optionally followed by a
//! potential offset) is `x^T A x - 2 B^T x + C`, the weighted mean-square
//! deviation between the model potential and the reference potential.

mod assembler;
mod model;
mod options;

pub use assembler::CostAssembler;
pub use model::EspCost;
pub use options::AssemblyOptions;
