use super::cli::Cli;
use super::cube::{Cube, write_cube};
use super::error::CliError;
use super::report::{self, RunSummary};
use super::store::{FitRecord, Store, SystemRecord};
use espfit::math::constants::BOHR_TO_ANGSTROM;
use espfit::{
    AssemblyEvent, AssemblyOptions, CostAssembler, GridData, RunConfig, UniformGrid,
    WeightCriterion, build_weights,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Grid positions of two cubes may differ by rounding in the file.
const GRID_TOLERANCE: f64 = 1e-5;

/// Key under which the results of a run are stored.
///
/// Isolated and periodic treatments of the same cube give different cost
/// functions, so isolated runs carry an extra `_iso`.
pub fn result_key(reduce: usize, isolated: bool, suffix: Option<&str>) -> String {
    let mut key = format!("espfit_r{}", reduce);
    if isolated {
        key.push_str("_iso");
    }
    if let Some(suffix) = suffix {
        key.push('_');
        key.push_str(suffix);
    }
    key
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The store already held the key and `--overwrite` was not given.
    Skipped { key: String, store: PathBuf },
    /// A new cost function was written to the store.
    Stored { key: String, store: PathBuf },
}

/// The cube path with `.espfit.json` appended.
pub fn default_store_path(cube: &Path) -> PathBuf {
    let mut path = OsString::from(cube.as_os_str());
    path.push(".espfit.json");
    PathBuf::from(path)
}

fn load_density(
    path: &Path,
    reduce: usize,
    potential_grid: &UniformGrid,
) -> Result<Vec<f64>, CliError> {
    let density = Cube::read(path)?
        .grid_data(potential_grid.is_periodic())?
        .reduce(reduce)?;
    if !density.grid().matches(potential_grid, GRID_TOLERANCE) {
        return Err(CliError::GridMismatch {
            path: path.to_path_buf(),
        });
    }
    Ok(density.into_parts().1)
}

/// Runs one fit set-up as described by the parsed command line.
///
/// All options, including the weighting grammars, are resolved and validated
/// before the store is consulted, so a malformed option is an error even when
/// the run would be skipped.
pub fn run(args: &Cli) -> Result<RunOutcome, CliError> {
    let config = match &args.run.config {
        Some(path) => {
            debug!("Reading run configuration from {}", path.display());
            RunConfig::load_from_file(path)?
        }
        None => RunConfig::default(),
    };

    let reduce = config.reduce(args.grid.reduce);
    let splitting = config.splitting_parameters(
        args.splitting.rcut,
        args.splitting.alpha_scale,
        args.splitting.gcut_scale,
    )?;
    let fit_offset = config.fit_offset(args.splitting.fit_offset);
    let density_spec = config.density_spec(args.weights.wdens.as_deref())?;
    let near_specs = config.near_specs(&args.weights.wnear)?;
    let far_spec = config.far_spec(args.weights.wfar.as_deref())?;

    let key = result_key(reduce, args.grid.isolated, args.output.suffix.as_deref());
    let store_path = args
        .output
        .output
        .clone()
        .unwrap_or_else(|| default_store_path(&args.cube));

    let mut store = Store::open(&store_path)?;
    if store.contains(&key) && !args.output.overwrite {
        return Ok(RunOutcome::Skipped {
            key,
            store: store_path,
        });
    }

    info!("Loading potential array from {}", args.cube.display());
    let cube = Cube::read(&args.cube)?;
    debug!("Cube title: '{}', comment: '{}'", cube.title, cube.comment);
    let potential: GridData = cube.grid_data(!args.grid.isolated)?.reduce(reduce)?;
    if reduce > 1 {
        debug!(
            "Reduced grid {:?} to {:?} with stride {}",
            cube.shape,
            potential.grid().shape(),
            reduce
        );
    }

    let mut criteria: Vec<WeightCriterion> = Vec::new();
    if let Some(spec) = &density_spec {
        info!("Loading density array from {}", spec.path.display());
        let rho = load_density(&spec.path, reduce, potential.grid())?;
        criteria.push(spec.with_density(rho)?);
    }
    for near in &near_specs {
        criteria.push(near.to_criterion()?);
    }
    if let Some(far) = &far_spec {
        criteria.push(far.to_criterion()?);
    }
    let weights = build_weights(&cube.atoms, potential.grid(), &criteria)?;

    if let Some(path) = &args.output.wsave {
        info!("Saving weights array to {}", path.display());
        write_cube(
            path,
            "espfit weights",
            &cube.atoms,
            potential.grid(),
            weights.as_slice(),
        )?;
    }

    info!("Setting up cost function (may take a while)");
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    if log::max_level() < log::LevelFilter::Info {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    let observer = |event: AssemblyEvent| match event {
        AssemblyEvent::Started {
            points,
            unknowns,
            reciprocal_terms,
        } => debug!(
            "Assembling {} unknowns over {} grid points with {} reciprocal vectors",
            unknowns, points, reciprocal_terms
        ),
        AssemblyEvent::Progress { completed, total } => {
            pb.set_length(total as u64);
            pb.set_position(completed as u64);
        }
        AssemblyEvent::Finished { used_points } => {
            debug!("Assembly used {} grid points", used_points)
        }
    };
    let cost = CostAssembler::new(splitting)
        .with_options(AssemblyOptions {
            fit_offset,
            ..AssemblyOptions::default()
        })
        .with_observer(&observer)
        .assemble(
            &cube.atoms,
            potential.grid(),
            potential.values(),
            weights.as_slice(),
        )?;
    pb.finish_and_clear();

    let condition = cost.condition()?;
    if condition.is_degenerate() {
        warn!("The cost matrix is singular; the condition number is reported as 0");
    }

    if log::max_level() >= log::LevelFilter::Info {
        let source_name = args.cube.display().to_string();
        let summary = RunSummary {
            key: &key,
            source_name: &source_name,
            unknowns: cost.size(),
            weights: weights.summary(),
            condition: &condition,
        };
        report::write_summary(&mut std::io::stdout(), &summary)?;
    }

    store.system = Some(SystemRecord::new(&cube.atoms, potential.grid().cell()));
    store.insert(
        key.clone(),
        FitRecord {
            reduce,
            rcut: splitting.rcut * BOHR_TO_ANGSTROM,
            alpha_scale: splitting.alpha_scale,
            gcut_scale: splitting.gcut_scale,
            fit_offset,
            grid_rvecs: potential.grid().grid_rvecs().to_vec(),
            a: cost.a_rows(),
            b: cost.b_vec(),
            c: cost.c(),
            evals: condition.evals.clone(),
            cn: condition.condition_number,
        },
    );
    store.save(&store_path)?;

    Ok(RunOutcome::Stored {
        key,
        store: store_path,
    })
}
