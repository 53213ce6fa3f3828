use super::error::CliError;
use espfit::math::constants::ANGSTROM;
use espfit::{Atom, GridData, UniformGrid};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Contents of a Gaussian cube file, with all lengths in bohr.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub title: String,
    pub comment: String,
    pub atoms: Vec<Atom>,
    pub origin: [f64; 3],
    pub grid_rvecs: [[f64; 3]; 3],
    pub shape: [usize; 3],
    pub values: Vec<f64>,
}

struct Parser<'a> {
    path: &'a Path,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Parser<'a> {
    fn error(&self, details: impl Into<String>) -> CliError {
        CliError::CubeParse {
            path: self.path.to_path_buf(),
            details: details.into(),
        }
    }

    fn line(&mut self, what: &str) -> Result<(usize, &'a str), CliError> {
        self.lines
            .next()
            .map(|(i, line)| (i + 1, line))
            .ok_or_else(|| self.error(format!("unexpected end of file, missing {}", what)))
    }

    fn fields<const N: usize>(&mut self, what: &str) -> Result<[f64; N], CliError> {
        let (number, line) = self.line(what)?;
        let mut out = [0.0; N];
        let mut tokens = line.split_whitespace();
        for slot in out.iter_mut() {
            let token = tokens.next().ok_or_else(|| {
                self.error(format!("line {}: expected {} fields for {}", number, N, what))
            })?;
            *slot = token.parse().map_err(|_| {
                self.error(format!("line {}: invalid number '{}' in {}", number, token, what))
            })?;
        }
        Ok(out)
    }
}

fn parse_count(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.is_finite()).then_some(value as i64)
}

impl Cube {
    pub fn read(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, CliError> {
        let mut parser = Parser {
            path,
            lines: content.lines().enumerate(),
        };
        let title = parser.line("title")?.1.trim().to_string();
        let comment = parser.line("comment")?.1.trim().to_string();

        let [natom, ox, oy, oz] = parser.fields::<4>("atom count and origin")?;
        let natom =
            parse_count(natom).ok_or_else(|| parser.error("the atom count is not an integer"))?;
        let orbital_cube = natom < 0;
        let natom = natom.unsigned_abs() as usize;
        if natom == 0 {
            return Err(parser.error("the file contains no atoms"));
        }

        let mut shape = [0usize; 3];
        let mut grid_rvecs = [[0.0; 3]; 3];
        let mut in_angstrom = false;
        for axis in 0..3 {
            let [n, x, y, z] = parser.fields::<4>("grid axis")?;
            let n = parse_count(n)
                .filter(|&n| n != 0)
                .ok_or_else(|| parser.error("grid axis counts must be non-zero integers"))?;
            if axis == 0 {
                in_angstrom = n < 0;
            }
            shape[axis] = n.unsigned_abs() as usize;
            grid_rvecs[axis] = [x, y, z];
        }
        let unit = if in_angstrom { ANGSTROM } else { 1.0 };
        let origin = [ox, oy, oz].map(|v| v * unit);
        let grid_rvecs = grid_rvecs.map(|v| v.map(|c| c * unit));

        let mut atoms = Vec::with_capacity(natom);
        for _ in 0..natom {
            let [number, _pseudo_charge, x, y, z] = parser.fields::<5>("atom")?;
            let number = parse_count(number)
                .and_then(|n| u8::try_from(n).ok())
                .filter(|&n| n > 0)
                .ok_or_else(|| parser.error(format!("invalid atomic number {}", number)))?;
            atoms.push(Atom::new(number, [x * unit, y * unit, z * unit]));
        }
        if orbital_cube {
            parser.line("orbital list")?;
        }

        let npoint = shape.iter().product::<usize>();
        let mut values = Vec::with_capacity(npoint);
        for (_, line) in parser.lines.by_ref() {
            for token in line.split_whitespace() {
                let value: f64 = token.parse().map_err(|_| CliError::CubeParse {
                    path: path.to_path_buf(),
                    details: format!("invalid grid value '{}'", token),
                })?;
                values.push(value);
            }
        }
        if values.len() != npoint {
            return Err(CliError::CubeParse {
                path: path.to_path_buf(),
                details: format!("expected {} grid values, found {}", npoint, values.len()),
            });
        }

        Ok(Self {
            title,
            comment,
            atoms,
            origin,
            grid_rvecs,
            shape,
            values,
        })
    }

    /// The grid and its values. A periodic grid spans the cell
    /// `grid_rvecs[i] * shape[i]`.
    pub fn grid_data(&self, periodic: bool) -> Result<GridData, CliError> {
        let grid = UniformGrid::new(self.origin, self.grid_rvecs, self.shape, periodic)?;
        Ok(GridData::new(grid, self.values.clone())?)
    }
}

/// Writes `values` on `grid` as a cube file in bohr.
pub fn write_cube(
    path: &Path,
    title: &str,
    atoms: &[Atom],
    grid: &UniformGrid,
    values: &[f64],
) -> Result<(), CliError> {
    let io_error = |source| CliError::Io {
        path: PathBuf::from(path),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    write_cube_to(&mut writer, title, atoms, grid, values)
        .and_then(|_| writer.flush())
        .map_err(io_error)
}

fn write_cube_to(
    writer: &mut dyn Write,
    title: &str,
    atoms: &[Atom],
    grid: &UniformGrid,
    values: &[f64],
) -> std::io::Result<()> {
    writeln!(writer, "{}", title)?;
    writeln!(writer, "OUTER LOOP: X, MIDDLE LOOP: Y, INNER LOOP: Z")?;
    let [ox, oy, oz] = grid.origin();
    writeln!(writer, "{:5} {:12.6} {:12.6} {:12.6}", atoms.len(), ox, oy, oz)?;
    for (n, [x, y, z]) in grid.shape().into_iter().zip(grid.grid_rvecs()) {
        writeln!(writer, "{:5} {:12.6} {:12.6} {:12.6}", n, x, y, z)?;
    }
    for atom in atoms {
        let [x, y, z] = atom.position;
        writeln!(
            writer,
            "{:5} {:12.6} {:12.6} {:12.6} {:12.6}",
            atom.atomic_number, atom.atomic_number as f64, x, y, z
        )?;
    }
    let n2 = grid.shape()[2];
    for row in values.chunks(n2) {
        for line in row.chunks(6) {
            let formatted: Vec<String> = line.iter().map(|v| format!(" {:.5e}", v)).collect();
            writeln!(writer, "{}", formatted.concat())?;
        }
    }
    Ok(())
}
