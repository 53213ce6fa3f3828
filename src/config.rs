//! This module provides the optional TOML run configuration.
//!
//! A `RunConfig` carries defaults for everything a fitting run can be tuned
//! with: the Ewald splitting, the grid stride, the potential offset and the
//! three weighting criteria. Every field is optional; values given explicitly
//! by the caller take precedence, then the file, then the built-in defaults.
//!
//! ```toml
//! reduce = 2
//! fit_offset = true
//!
//! [splitting]
//! rcut = 12.0        # angstrom
//! alpha_scale = 3.0
//! gcut_scale = 1.1
//!
//! [weights]
//! dens = "density.cube:2e-4:1.0"
//! near = ["1:1.0", "8:1.5:0.5"]
//! far = "4.0"
//! ```

use crate::error::EspError;
use crate::ewald::SplittingParameters;
use crate::weights::{DensitySpec, FarSpec, NearSpec, parse_near_list};
use serde::Deserialize;
use std::path::Path;

/// Default real-space cutoff of a run, in angstrom.
pub const DEFAULT_RCUT_ANGSTROM: f64 = 10.0;
/// Default `alpha_scale` of a run.
pub const DEFAULT_ALPHA_SCALE: f64 = 3.0;
/// Default `gcut_scale` of a run.
pub const DEFAULT_GCUT_SCALE: f64 = 1.1;
/// Default grid stride of a run.
pub const DEFAULT_REDUCE: usize = 1;

/// Splitting section of a run configuration.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SplittingConfig {
    /// Real-space cutoff in angstrom.
    pub rcut: Option<f64>,
    pub alpha_scale: Option<f64>,
    pub gcut_scale: Option<f64>,
}

/// Weighting section of a run configuration, in the textual grammars of
/// [`crate::weights`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WeightsConfig {
    pub dens: Option<String>,
    pub near: Vec<String>,
    pub far: Option<String>,
}

/// Defaults for one fitting run, usually read from a TOML file.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub reduce: Option<usize>,
    pub fit_offset: Option<bool>,
    pub splitting: SplittingConfig,
    pub weights: WeightsConfig,
}

impl RunConfig {
    /// Loads a run configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `EspError::IoError` if the file cannot be read and
    /// `EspError::DeserializationError` if its content is not a valid
    /// configuration.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use espfit::RunConfig;
    /// use std::path::Path;
    ///
    /// let config = RunConfig::load_from_file(Path::new("espfit.toml")).unwrap();
    /// ```
    pub fn load_from_file(path: &Path) -> Result<Self, EspError> {
        let content = std::fs::read_to_string(path).map_err(|io_error| EspError::IoError {
            path: path.to_path_buf(),
            source: io_error,
        })?;

        Self::load_from_str(&content)
    }

    /// Parses a run configuration from a TOML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use espfit::RunConfig;
    ///
    /// let config = RunConfig::load_from_str("reduce = 2\n[splitting]\nrcut = 12.0\n").unwrap();
    /// assert_eq!(config.reduce, Some(2));
    /// assert_eq!(config.splitting.rcut, Some(12.0));
    /// ```
    pub fn load_from_str(toml_str: &str) -> Result<Self, EspError> {
        toml::from_str(toml_str).map_err(EspError::from)
    }

    /// Resolves the splitting parameters.
    ///
    /// Each `Some` argument overrides the corresponding configuration entry.
    /// `rcut` is in angstrom.
    pub fn splitting_parameters(
        &self,
        rcut: Option<f64>,
        alpha_scale: Option<f64>,
        gcut_scale: Option<f64>,
    ) -> Result<SplittingParameters, EspError> {
        let splitting = SplittingParameters::from_angstrom(
            rcut.or(self.splitting.rcut).unwrap_or(DEFAULT_RCUT_ANGSTROM),
            alpha_scale
                .or(self.splitting.alpha_scale)
                .unwrap_or(DEFAULT_ALPHA_SCALE),
            gcut_scale
                .or(self.splitting.gcut_scale)
                .unwrap_or(DEFAULT_GCUT_SCALE),
        );
        splitting.validate()?;
        Ok(splitting)
    }

    /// The grid stride, with `reduce` overriding the configuration.
    pub fn reduce(&self, reduce: Option<usize>) -> usize {
        reduce.or(self.reduce).unwrap_or(DEFAULT_REDUCE).max(1)
    }

    /// Whether to fit a potential offset. An explicit `true` from the caller
    /// wins; otherwise the configuration decides.
    pub fn fit_offset(&self, fit_offset: bool) -> bool {
        fit_offset || self.fit_offset.unwrap_or(false)
    }

    /// The density criterion, with `dens` overriding the configuration.
    pub fn density_spec(&self, dens: Option<&str>) -> Result<Option<DensitySpec>, EspError> {
        dens.or(self.weights.dens.as_deref())
            .map(str::parse)
            .transpose()
    }

    /// The near criteria. A non-empty `near` replaces the configured list.
    pub fn near_specs<S: AsRef<str>>(&self, near: &[S]) -> Result<Vec<NearSpec>, EspError> {
        if near.is_empty() {
            parse_near_list(self.weights.near.as_slice())
        } else {
            parse_near_list(near)
        }
    }

    /// The far criterion, with `far` overriding the configuration.
    pub fn far_spec(&self, far: Option<&str>) -> Result<Option<FarSpec>, EspError> {
        far.or(self.weights.far.as_deref())
            .map(str::parse)
            .transpose()
    }
}
