use clap::{Args, Parser};
use std::path::PathBuf;

const ABOUT: &str = "Builds the least-squares cost function for fitting atomic charges to an \
electrostatic potential sampled on a cube-file grid.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser)]
#[command(version, about = ABOUT, help_template = HELP_TEMPLATE)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Cube file with the reference electrostatic potential.
    ///
    /// The potential is in atomic units, sampled on a uniform grid. Unless
    /// --isolated is given, the grid is taken to span one periodic cell.
    #[arg(value_name = "CUBE")]
    pub cube: PathBuf,

    #[command(flatten)]
    pub output: OutputOptions,

    #[command(flatten)]
    pub grid: GridOptions,

    #[command(flatten)]
    pub splitting: SplittingOptions,

    #[command(flatten)]
    pub weights: WeightOptions,

    #[command(flatten)]
    pub run: RunOptions,
}

/// Options for controlling where and under which name results are stored.
#[derive(Args)]
#[command(next_help_heading = "Output Options")]
pub struct OutputOptions {
    /// JSON result store.
    ///
    /// Defaults to the cube path with '.espfit.json' appended.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Replace results already present under the same key.
    #[arg(long)]
    pub overwrite: bool,

    /// Extra suffix for the result key.
    ///
    /// The key is 'espfit_r<REDUCE>', followed by '_iso' for isolated runs and
    /// then by '_<SUFFIX>'.
    #[arg(long, value_name = "SUFFIX")]
    pub suffix: Option<String>,

    /// Write the weights to this cube file.
    #[arg(long, value_name = "FILE")]
    pub wsave: Option<PathBuf>,
}

/// Options for controlling how the grid is interpreted.
#[derive(Args)]
#[command(next_help_heading = "Grid Options")]
pub struct GridOptions {
    /// Keep only every REDUCE-th grid point along each axis [default: 1].
    #[arg(short, long, value_name = "REDUCE")]
    pub reduce: Option<usize>,

    /// Treat the grid as an isolated (non-periodic) system.
    ///
    /// Results are stored under their own key, so isolated and periodic runs
    /// of the same cube do not replace each other.
    #[arg(long)]
    pub isolated: bool,
}

/// Options for controlling the Ewald splitting of the interaction.
#[derive(Args)]
#[command(next_help_heading = "Splitting Options")]
pub struct SplittingOptions {
    /// Real-space cutoff in angstrom [default: 10].
    #[arg(long, value_name = "ANGSTROM")]
    pub rcut: Option<f64>,

    /// Screening parameter times the cutoff [default: 3.0].
    #[arg(long, value_name = "SCALE")]
    pub alpha_scale: Option<f64>,

    /// Reciprocal cutoff divided by the screening parameter [default: 1.1].
    #[arg(long, value_name = "SCALE")]
    pub gcut_scale: Option<f64>,

    /// Add a constant potential offset as an extra unknown.
    #[arg(long)]
    pub fit_offset: bool,
}

/// Options for controlling the weight function.
#[derive(Args)]
#[command(next_help_heading = "Weight Options")]
pub struct WeightOptions {
    /// Density-based weighting: 'file[:rho0[:alpha]]'.
    ///
    /// Points where the density cube exceeds rho0 (default 2e-4 bohr^-3) are
    /// switched off over alpha decades (default 1.0).
    #[arg(long, value_name = "SPEC")]
    pub wdens: Option<String>,

    /// Element-specific exclusion: 'number:r0[:gamma]' in angstrom.
    ///
    /// Points closer than r0 to an atom of the given element are switched off
    /// over a width gamma (default r0/2). May be given several times.
    #[arg(long, value_name = "SPEC", num_args = 1..)]
    pub wnear: Vec<String>,

    /// Exclusion far from all atoms: 'r0[:gamma]' in angstrom.
    ///
    /// Points farther than r0 from the nearest atom are switched off over a
    /// width gamma (default 1.0).
    #[arg(long, value_name = "SPEC")]
    pub wfar: Option<String>,
}

/// Options for controlling the run itself.
#[derive(Args)]
#[command(next_help_heading = "Run Options")]
pub struct RunOptions {
    /// TOML file with defaults for the options above.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only report errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunOptions {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
