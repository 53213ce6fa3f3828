//! Core atom types shared by the weighting and cost-assembly stages.
//!
//! The unknowns of an ESP fit are point charges sitting on atoms. The engine
//! only needs the element (for element-specific weighting) and the position of
//! each atom, so it reads them through the `AtomView` trait and never takes
//! ownership of the caller's structure.

/// A trait for viewing atom data without owning it.
///
/// Positions are Cartesian coordinates in bohr. Implement this trait on your
/// own molecular representation to use it directly with the weighting and
/// assembly routines.
///
/// The order in which atoms are passed defines the order of the unknowns:
/// row `i` of the cost matrices belongs to the charge on atom `i`.
pub trait AtomView {
    /// Returns the atomic number of the atom.
    ///
    /// It selects the element-specific near-nucleus exclusion, if one was
    /// configured, and is otherwise only carried through to the output.
    fn atomic_number(&self) -> u8;

    /// Returns the position of the atom in bohr.
    ///
    /// This is where the unit point charge of the atom sits when its potential
    /// is evaluated on the grid. In a periodic cell any image of the position
    /// gives the same result.
    fn position(&self) -> [f64; 3];
}

/// A concrete representation of an atom with atomic number and position.
///
/// This is the owned form used by the cube reader and the tests. Anything
/// else that implements [`AtomView`] works just as well.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The atomic number of the atom, identifying its chemical element.
    pub atomic_number: u8,
    /// The position of the atom in bohr.
    pub position: [f64; 3],
}

impl Atom {
    /// Creates an atom from an atomic number and a position in bohr.
    pub fn new(atomic_number: u8, position: [f64; 3]) -> Self {
        Self {
            atomic_number,
            position,
        }
    }
}

impl AtomView for Atom {
    #[inline(always)]
    fn atomic_number(&self) -> u8 {
        self.atomic_number
    }

    #[inline(always)]
    fn position(&self) -> [f64; 3] {
        self.position
    }
}
