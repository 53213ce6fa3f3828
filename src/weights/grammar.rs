//! Textual mini-grammars for the weighting criteria.
//!
//! These are parsed once, at the boundary of the program (command line or
//! configuration file), into validated parameter structs. Lengths are given
//! in angstrom and stored in bohr.
//!
//! | criterion | grammar                       | defaults                        |
//! |-----------|-------------------------------|---------------------------------|
//! | density   | `file[:rho0[:alpha]]`         | `rho0 = 2e-4`, `alpha = 1.0`    |
//! | near      | `number:r0[:gamma]`           | `gamma = 0.5 * r0`              |
//! | far       | `r0[:gamma]`                  | `gamma = 1.0`                   |
//!
//! The density file name may itself contain ':' (a drive letter, say). Its
//! numeric fields are therefore taken from the right: a trailing field that
//! starts like a number (a digit, sign or '.') is a number and must parse as
//! one, anything else belongs to the file name.

use super::criteria::{DensityCriterion, FarCriterion, NearCriterion, WeightCriterion};
use crate::error::EspError;
use crate::math::constants::ANGSTROM;
use std::path::PathBuf;
use std::str::FromStr;

/// Default density at which the density criterion switches, in bohr⁻³.
pub const DEFAULT_RHO0: f64 = 2e-4;
/// Default half-width of the density switch, in decades.
pub const DEFAULT_DENSITY_ALPHA: f64 = 1.0;
/// Default half-width of the far switch, in angstrom.
pub const DEFAULT_FAR_GAMMA_ANGSTROM: f64 = 1.0;

fn invalid(spec: &str, details: impl Into<String>) -> EspError {
    EspError::InvalidSpec {
        spec: spec.to_string(),
        details: details.into(),
    }
}

fn parse_field<T: FromStr>(spec: &str, field: &str, name: &str) -> Result<T, EspError> {
    field
        .trim()
        .parse()
        .map_err(|_| invalid(spec, format!("cannot parse {} from '{}'", name, field)))
}

fn split_fields<'a>(spec: &'a str, min: usize, max: usize) -> Result<Vec<&'a str>, EspError> {
    let fields: Vec<&str> = spec.split(':').collect();
    if fields.len() < min || fields.len() > max {
        return Err(invalid(
            spec,
            format!(
                "expected between {} and {} ':'-separated fields, got {}",
                min,
                max,
                fields.len()
            ),
        ));
    }
    Ok(fields)
}

fn looks_numeric(field: &str) -> bool {
    field
        .trim()
        .starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}

/// Splits `file[:rho0[:alpha]]` into the file name and its numeric fields.
fn split_density(spec: &str) -> Result<(&str, Vec<&str>), EspError> {
    let mut numbers = Vec::with_capacity(2);
    let mut path = spec;
    let mut consumed = 0;
    for field in spec.rsplitn(3, ':') {
        if numbers.len() == 2 || !looks_numeric(field) {
            break;
        }
        numbers.push(field);
        consumed += field.len() + 1;
        path = &spec[..spec.len().saturating_sub(consumed)];
    }
    if let Some((_, last)) = path.rsplit_once(':') {
        if looks_numeric(last) {
            return Err(invalid(spec, "expected at most two numbers after the file name"));
        }
    }
    numbers.reverse();
    Ok((path, numbers))
}

/// Parsed form of `file[:rho0[:alpha]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensitySpec {
    /// Volumetric file holding the density on the potential grid.
    pub path: PathBuf,
    /// Switching density in bohr⁻³.
    pub rho0: f64,
    /// Half-width of the switch in decades of the density.
    pub alpha: f64,
}

impl DensitySpec {
    /// Builds the criterion once the density cube has been read.
    pub fn with_density(&self, density: Vec<f64>) -> Result<WeightCriterion, EspError> {
        Ok(DensityCriterion::new(density, self.rho0, self.alpha)?.into())
    }
}

impl FromStr for DensitySpec {
    type Err = EspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, numbers) = split_density(s)?;
        if path.trim().is_empty() {
            return Err(invalid(s, "missing density file"));
        }
        let rho0 = match numbers.first() {
            Some(f) => parse_field(s, f, "rho0")?,
            None => DEFAULT_RHO0,
        };
        let alpha = match numbers.get(1) {
            Some(f) => parse_field(s, f, "alpha")?,
            None => DEFAULT_DENSITY_ALPHA,
        };
        if !(rho0 > 0.0) || !(alpha > 0.0) {
            return Err(invalid(s, "rho0 and alpha must be positive"));
        }
        Ok(Self {
            path: PathBuf::from(path.trim()),
            rho0,
            alpha,
        })
    }
}

/// Parsed form of `number:r0[:gamma]`, lengths converted to bohr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearSpec {
    pub atomic_number: u8,
    pub r0: f64,
    pub gamma: f64,
}

impl NearSpec {
    pub fn to_criterion(&self) -> Result<WeightCriterion, EspError> {
        Ok(NearCriterion::new(self.atomic_number, self.r0, self.gamma)?.into())
    }
}

impl FromStr for NearSpec {
    type Err = EspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(s, 2, 3)?;
        let atomic_number: u8 = parse_field(s, fields[0], "element number")?;
        if atomic_number == 0 {
            return Err(invalid(s, "element number must be positive"));
        }
        let r0: f64 = parse_field(s, fields[1], "r0")?;
        let gamma: f64 = match fields.get(2) {
            Some(f) => parse_field(s, f, "gamma")?,
            None => 0.5 * r0,
        };
        if !(r0 >= 0.0) || !(gamma > 0.0) {
            return Err(invalid(s, "r0 must be non-negative and gamma positive"));
        }
        Ok(Self {
            atomic_number,
            r0: r0 * ANGSTROM,
            gamma: gamma * ANGSTROM,
        })
    }
}

/// Parsed form of `r0[:gamma]`, lengths converted to bohr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarSpec {
    pub r0: f64,
    pub gamma: f64,
}

impl FarSpec {
    pub fn to_criterion(&self) -> Result<WeightCriterion, EspError> {
        Ok(FarCriterion::new(self.r0, self.gamma)?.into())
    }
}

impl FromStr for FarSpec {
    type Err = EspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(s, 1, 2)?;
        let r0: f64 = parse_field(s, fields[0], "r0")?;
        let gamma: f64 = match fields.get(1) {
            Some(f) => parse_field(s, f, "gamma")?,
            None => DEFAULT_FAR_GAMMA_ANGSTROM,
        };
        if !(r0 >= 0.0) || !(gamma > 0.0) {
            return Err(invalid(s, "r0 must be non-negative and gamma positive"));
        }
        Ok(Self {
            r0: r0 * ANGSTROM,
            gamma: gamma * ANGSTROM,
        })
    }
}

/// Parses a list of near specifications. A later entry for the same element
/// replaces an earlier one.
pub fn parse_near_list<S: AsRef<str>>(specs: &[S]) -> Result<Vec<NearSpec>, EspError> {
    let mut parsed: Vec<NearSpec> = Vec::with_capacity(specs.len());
    for spec in specs {
        let near: NearSpec = spec.as_ref().parse()?;
        match parsed
            .iter_mut()
            .find(|p| p.atomic_number == near.atomic_number)
        {
            Some(existing) => *existing = near,
            None => parsed.push(near),
        }
    }
    Ok(parsed)
}
