use super::error::CliError;
use espfit::{Atom, Cell};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// The molecular system the stored cost functions refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub numbers: Vec<u8>,
    /// Atom positions in bohr.
    pub coordinates: Vec<[f64; 3]>,
    /// Cell vectors in bohr, empty for an isolated system.
    pub rvecs: Vec<[f64; 3]>,
}

impl SystemRecord {
    pub fn new(atoms: &[Atom], cell: &Cell) -> Self {
        Self {
            numbers: atoms.iter().map(|a| a.atomic_number).collect(),
            coordinates: atoms.iter().map(|a| a.position).collect(),
            rvecs: cell.rvecs().to_vec(),
        }
    }
}

/// One assembled cost function with the settings it was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub reduce: usize,
    /// Real-space cutoff in angstrom.
    pub rcut: f64,
    pub alpha_scale: f64,
    pub gcut_scale: f64,
    pub fit_offset: bool,
    /// Grid vectors of the (reduced) grid in bohr.
    pub grid_rvecs: Vec<[f64; 3]>,
    pub a: Vec<Vec<f64>>,
    pub b: Vec<f64>,
    pub c: f64,
    pub evals: Vec<f64>,
    pub cn: f64,
}

/// A JSON file collecting cost functions under named keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemRecord>,
    #[serde(default)]
    pub espfit: BTreeMap<String, FitRecord>,
}

impl Store {
    /// Opens an existing store, or starts an empty one if `path` does not
    /// exist yet.
    pub fn open(path: &Path) -> Result<Self, CliError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(CliError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|e| CliError::Store {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.espfit.contains_key(key)
    }

    /// Stores `record` under `key`, replacing any earlier entry.
    pub fn insert(&mut self, key: String, record: FitRecord) {
        self.espfit.insert(key, record);
    }

    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let io_error = |source| CliError::Io {
            path: PathBuf::from(path),
            source,
        };
        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| CliError::Store {
            path: path.to_path_buf(),
            source: e,
        })?;
        writer.flush().map_err(io_error)
    }
}
