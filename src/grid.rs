//! Regular three-dimensional sampling grids and their periodic cells.
//!
//! A [`UniformGrid`] is a lattice of `shape[0] x shape[1] x shape[2]` points
//! spanned by three grid vectors from an origin. A periodic grid wraps around
//! a [`Cell`] whose vectors are the grid vectors multiplied by the number of
//! points along each axis. Grids are immutable: reduction produces new grids.

use crate::error::EspError;
use crate::math::constants::DISTANCE_THRESHOLD_BOHR;

#[inline]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn scale(a: [f64; 3], f: f64) -> [f64; 3] {
    [a[0] * f, a[1] * f, a[2] * f]
}

/// A simulation cell, either isolated (no lattice vectors) or fully periodic.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    rvecs: Vec<[f64; 3]>,
    gvecs: Vec<[f64; 3]>,
    volume: f64,
}

impl Cell {
    /// A cell without periodic boundary conditions.
    pub fn isolated() -> Self {
        Self {
            rvecs: Vec::new(),
            gvecs: Vec::new(),
            volume: 0.0,
        }
    }

    /// A three-dimensional periodic cell spanned by `rvecs`.
    ///
    /// # Errors
    ///
    /// Returns `EspError::InvalidGrid` if the vectors are (nearly) linearly
    /// dependent.
    pub fn periodic(rvecs: [[f64; 3]; 3]) -> Result<Self, EspError> {
        let [a, b, c] = rvecs;
        let bxc = cross(b, c);
        let signed_volume = dot(a, bxc);
        if !signed_volume.is_finite() || signed_volume.abs() < DISTANCE_THRESHOLD_BOHR {
            return Err(EspError::InvalidGrid(format!(
                "cell vectors are degenerate (volume {:.3e})",
                signed_volume
            )));
        }
        let gvecs = vec![
            scale(bxc, 1.0 / signed_volume),
            scale(cross(c, a), 1.0 / signed_volume),
            scale(cross(a, b), 1.0 / signed_volume),
        ];
        Ok(Self {
            rvecs: rvecs.to_vec(),
            gvecs,
            volume: signed_volume.abs(),
        })
    }

    /// Number of periodic directions (0 or 3).
    pub fn nvec(&self) -> usize {
        self.rvecs.len()
    }

    pub fn is_periodic(&self) -> bool {
        !self.rvecs.is_empty()
    }

    /// The real-space lattice vectors.
    pub fn rvecs(&self) -> &[[f64; 3]] {
        &self.rvecs
    }

    /// The reciprocal lattice vectors, without the factor 2π, such that
    /// `rvecs[i] . gvecs[j] == delta_ij`.
    pub fn gvecs(&self) -> &[[f64; 3]] {
        &self.gvecs
    }

    /// The cell volume in bohr³ (zero for an isolated cell).
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Applies the minimum-image convention to a displacement vector.
    ///
    /// For an isolated cell the displacement is returned unchanged.
    pub fn mic(&self, mut delta: [f64; 3]) -> [f64; 3] {
        for (rvec, gvec) in self.rvecs.iter().zip(self.gvecs.iter()) {
            let frac = dot(*gvec, delta).round();
            if frac != 0.0 {
                for k in 0..3 {
                    delta[k] -= frac * rvec[k];
                }
            }
        }
        delta
    }

    /// The minimum-image distance between two points.
    pub fn distance(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        norm(self.mic(sub(a, b)))
    }

    /// For each lattice direction, the number of images that must be visited
    /// on either side to cover all points within `rcut` of a minimum-image
    /// displacement.
    pub fn image_ranges(&self, rcut: f64) -> Vec<i64> {
        self.gvecs
            .iter()
            .map(|g| (rcut * norm(*g)).ceil() as i64)
            .collect()
    }

    /// For each reciprocal direction, the largest index needed to enumerate
    /// all reciprocal vectors shorter than `gcut`.
    pub fn reciprocal_ranges(&self, gcut: f64) -> Vec<i64> {
        self.rvecs
            .iter()
            .map(|r| (gcut * norm(*r)).ceil() as i64)
            .collect()
    }
}

/// A regular grid of points spanned by three grid vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    origin: [f64; 3],
    grid_rvecs: [[f64; 3]; 3],
    shape: [usize; 3],
    cell: Cell,
}

impl UniformGrid {
    /// Creates a grid. When `periodic` is true the grid wraps around the cell
    /// `grid_rvecs[i] * shape[i]`.
    ///
    /// # Errors
    ///
    /// Returns `EspError::InvalidGrid` for an empty shape or degenerate grid
    /// vectors.
    pub fn new(
        origin: [f64; 3],
        grid_rvecs: [[f64; 3]; 3],
        shape: [usize; 3],
        periodic: bool,
    ) -> Result<Self, EspError> {
        if shape.iter().any(|&n| n == 0) {
            return Err(EspError::InvalidGrid(format!(
                "every axis needs at least one point, got shape {:?}",
                shape
            )));
        }
        let grid_volume = dot(grid_rvecs[0], cross(grid_rvecs[1], grid_rvecs[2]));
        if !grid_volume.is_finite() || grid_volume.abs() < DISTANCE_THRESHOLD_BOHR {
            return Err(EspError::InvalidGrid(
                "grid vectors are degenerate".to_string(),
            ));
        }
        let cell = if periodic {
            Cell::periodic([
                scale(grid_rvecs[0], shape[0] as f64),
                scale(grid_rvecs[1], shape[1] as f64),
                scale(grid_rvecs[2], shape[2] as f64),
            ])?
        } else {
            Cell::isolated()
        };
        Ok(Self {
            origin,
            grid_rvecs,
            shape,
            cell,
        })
    }

    /// Creates a grid from per-axis periodicity flags.
    ///
    /// # Errors
    ///
    /// Returns `EspError::UnsupportedPeriodicity` unless all or none of the
    /// axes are periodic.
    pub fn with_pbc(
        origin: [f64; 3],
        grid_rvecs: [[f64; 3]; 3],
        shape: [usize; 3],
        pbc: [bool; 3],
    ) -> Result<Self, EspError> {
        match pbc.iter().filter(|&&p| p).count() {
            0 => Self::new(origin, grid_rvecs, shape, false),
            3 => Self::new(origin, grid_rvecs, shape, true),
            n => Err(EspError::UnsupportedPeriodicity(n)),
        }
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn grid_rvecs(&self) -> [[f64; 3]; 3] {
        self.grid_rvecs
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn is_periodic(&self) -> bool {
        self.cell.is_periodic()
    }

    /// Total number of grid points.
    pub fn size(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    /// Splits a flat index into the three grid indices (last axis fastest).
    #[inline]
    pub fn unravel(&self, index: usize) -> [usize; 3] {
        let k = index % self.shape[2];
        let rest = index / self.shape[2];
        [rest / self.shape[1], rest % self.shape[1], k]
    }

    /// The Cartesian position of the point with the given flat index.
    #[inline]
    pub fn point(&self, index: usize) -> [f64; 3] {
        let [i, j, k] = self.unravel(index);
        let (fi, fj, fk) = (i as f64, j as f64, k as f64);
        let r = &self.grid_rvecs;
        [
            self.origin[0] + fi * r[0][0] + fj * r[1][0] + fk * r[2][0],
            self.origin[1] + fi * r[0][1] + fj * r[1][1] + fk * r[2][1],
            self.origin[2] + fi * r[0][2] + fj * r[1][2] + fk * r[2][2],
        ]
    }

    /// Shape of the grid after sub-sampling with `stride`.
    fn reduced_shape(&self, stride: usize) -> Result<[usize; 3], EspError> {
        if self.is_periodic() && self.shape.iter().any(|&n| n % stride != 0) {
            return Err(EspError::IncommensurateStride {
                stride,
                shape: self.shape,
            });
        }
        Ok(self.shape.map(|n| n.div_ceil(stride)))
    }

    /// Sub-samples the grid by keeping every `stride`-th point along each axis.
    ///
    /// Strides of zero or one return an identical copy. The origin is kept and
    /// the grid vectors are scaled by the stride, so a periodic grid keeps its
    /// cell.
    ///
    /// # Errors
    ///
    /// Returns `EspError::IncommensurateStride` for a periodic grid whose axis
    /// lengths are not all multiples of the stride.
    pub fn reduce(&self, stride: usize) -> Result<Self, EspError> {
        if stride <= 1 {
            return Ok(self.clone());
        }
        let shape = self.reduced_shape(stride)?;
        let s = stride as f64;
        Self::new(
            self.origin,
            self.grid_rvecs.map(|v| scale(v, s)),
            shape,
            self.is_periodic(),
        )
    }

    /// True when both grids describe the same lattice within `tolerance` bohr.
    pub fn matches(&self, other: &UniformGrid, tolerance: f64) -> bool {
        let close = |a: [f64; 3], b: [f64; 3]| norm(sub(a, b)) <= tolerance;
        self.shape == other.shape
            && self.is_periodic() == other.is_periodic()
            && close(self.origin, other.origin)
            && (0..3).all(|i| close(self.grid_rvecs[i], other.grid_rvecs[i]))
    }
}

/// A grid together with one scalar value per grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct GridData {
    grid: UniformGrid,
    values: Vec<f64>,
}

impl GridData {
    /// Pairs a grid with its sampled values.
    ///
    /// # Errors
    ///
    /// Returns `EspError::LengthMismatch` if the number of values differs from
    /// the number of grid points.
    pub fn new(grid: UniformGrid, values: Vec<f64>) -> Result<Self, EspError> {
        if values.len() != grid.size() {
            return Err(EspError::LengthMismatch {
                what: "grid values",
                expected: grid.size(),
                found: values.len(),
            });
        }
        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_parts(self) -> (UniformGrid, Vec<f64>) {
        (self.grid, self.values)
    }

    /// Sub-samples grid and values consistently, see [`UniformGrid::reduce`].
    pub fn reduce(&self, stride: usize) -> Result<Self, EspError> {
        if stride <= 1 {
            return Ok(self.clone());
        }
        let grid = self.grid.reduce(stride)?;
        let [n0, n1, n2] = self.grid.shape();
        let mut values = Vec::with_capacity(grid.size());
        for i in (0..n0).step_by(stride) {
            for j in (0..n1).step_by(stride) {
                for k in (0..n2).step_by(stride) {
                    values.push(self.values[(i * n1 + j) * n2 + k]);
                }
            }
        }
        Self::new(grid, values)
    }
}
