use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzempcpd::{
    annotate_peaks, patterns::derivatization_patterns, ConstructorParams, DistanceCoelution,
    EmpiricalCompoundConstructor, EmpiricalCompoundRecord, GroupingError, IonMode, PeakList,
    SearchParams, TreeAssembler,
};
use mzempcpd::tree::TreeParams;

use crate::args::{ArgCoelution, ArgIonMode, ArgOwnershipPolicy, GroupingMethod, PatternOverrides};
use crate::io::{read_peaks, write_json, write_output};
use crate::time_range::TimeRange;

fn non_negative_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 || !value.is_finite() {
        Err(format!("`{s}` is not a finite number at least zero"))
    } else {
        Ok(value)
    }
}

#[derive(Debug, Error)]
pub enum MZEmpCpderError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read peak records: {0}")]
    JSONError(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Failed to group peaks: {0}")]
    GroupingError(
        #[source]
        #[from]
        GroupingError,
    ),
    #[error("Failed to read the configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        Box<figment::Error>,
    ),
    #[error("Failed to write the configuration: {0}")]
    ConfigWriteError(
        #[source]
        #[from]
        toml::ser::Error,
    ),
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

impl From<figment::Error> for MZEmpCpderError {
    fn from(value: figment::Error) -> Self {
        Self::ConfigError(Box::new(value))
    }
}

/// Group the peaks of an LC-MS feature table into empirical compounds.
///
/// Read a JSON peak list from a file or stream, relate peaks by isotope and adduct
/// mass differences, and write out empirical compound records or isotope trees.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZEmpCpder {
    /// The path to read the input peaks from, or if '-' is passed, read from STDIN
    #[arg()]
    pub input_file: String,

    /// The path to write the output file to, or if '-' is passed, write to STDOUT.
    ///
    /// A path ending in `.gz` is gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzempcpder.toml` in the working directory.
    /// Environment variables prefixed with `MZEMPCPDER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Write the effective configuration as TOML to this path before running
    #[arg(long = "write-config")]
    pub write_config: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The time range to process, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The time range to process, denoted (start?)-(stop?)

Only peaks whose apex falls within the range are grouped.
If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// The ionization mode, selecting the adduct tables
    #[arg(short = 'm', long = "mode", default_value = "pos")]
    pub mode: ArgIonMode,

    /// The grouping model to build
    #[arg(short = 'g', long = "method", default_value = "epd")]
    pub method: GroupingMethod,

    /// The m/z matching tolerance in parts-per-million
    #[arg(
        short = 'p',
        long = "ppm",
        default_value_t = 5.0,
        value_parser = non_negative_float_f64
    )]
    pub mz_tolerance_ppm: f64,

    /// The maximum apex distance between isotopologues.
    ///
    /// Defaults to 5 for empirical compounds and 2 for isotope trees.
    #[arg(short = 'i', long = "isotope-rt-tolerance", value_parser = non_negative_float_f64)]
    pub isotope_rt_tolerance: Option<f64>,

    /// The maximum apex distance for two peaks to co-elute, also used between
    /// in-source modification roots when grafting trees
    #[arg(
        short = 'c',
        long = "coelution-rt-tolerance",
        default_value_t = 10.0,
        value_parser = non_negative_float_f64
    )]
    pub coelution_rt_tolerance: f64,

    /// Whether to enforce isotope height ratio bounds.
    ///
    /// Enforced by default for empirical compounds and not for isotope trees.
    #[arg(long = "check-ratio")]
    pub check_ratio: Option<bool>,

    /// How co-elution is judged while building empirical compounds
    #[arg(long = "coelution", default_value = "overlap")]
    pub coelution: ArgCoelution,

    /// How peaks claimed by more than one empirical compound are resolved
    #[arg(long = "ownership", default_value = "flag")]
    pub ownership: ArgOwnershipPolicy,

    /// The maximum number of isotope steps below a tree root, also bounding the rounds
    /// of branch attachment
    #[arg(short = 'd', long = "tree-depth-limit", default_value_t = 10)]
    pub tree_depth_limit: usize,

    /// Report peaks that are not related to any other as their own compound or tree
    #[arg(short = 's', long = "include-singletons")]
    pub include_singletons: bool,

    /// Also graft trees of derivatized forms, which must elute after their parent
    #[arg(long = "derivatization")]
    pub derivatization: bool,

    /// Write the input peaks annotated with their ion relation to this path
    #[arg(short = 'a', long = "annotated-peaks")]
    pub annotated_peaks: Option<PathBuf>,

    #[arg(
        skip,
        help = "Pattern tables that replace the built in isotope and adduct tables"
    )]
    #[serde(default)]
    pub patterns: PatternOverrides,
}

impl MZEmpCpder {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZEmpCpderError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(pool)
    }

    pub fn ion_mode(&self) -> IonMode {
        self.mode.into()
    }

    /// The empirical compound parameters with any model-specific defaults filled in
    pub fn constructor_params(&self) -> ConstructorParams {
        let defaults = SearchParams::default();
        ConstructorParams {
            search: SearchParams::new(
                self.mz_tolerance_ppm,
                self.isotope_rt_tolerance
                    .unwrap_or(defaults.isotope_rt_tolerance),
                self.coelution_rt_tolerance,
                self.check_ratio.unwrap_or(defaults.check_ratio),
            ),
            ownership: self.ownership.into(),
            include_singletons: self.include_singletons,
        }
    }

    /// The isotope tree parameters with any model-specific defaults filled in
    pub fn tree_params(&self) -> TreeParams {
        let defaults = TreeParams::default();
        TreeParams {
            mz_tolerance_ppm: self.mz_tolerance_ppm,
            isotope_rt_tolerance: self
                .isotope_rt_tolerance
                .unwrap_or(defaults.isotope_rt_tolerance),
            check_ratio: self.check_ratio.unwrap_or(defaults.check_ratio),
            tree_depth_limit: self.tree_depth_limit,
            include_singletons: self.include_singletons,
            graft_rt_tolerance: self.coelution_rt_tolerance,
        }
    }

    pub fn main(&self) -> Result<(), MZEmpCpderError> {
        info!(
            "mzempcpder v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());
        if let Some(path) = self.write_config.as_ref() {
            fs::write(path, toml::to_string_pretty(self)?)?;
            info!("Configuration written to {}", path.display());
        }
        self.create_threadpool()?.install(|| self.run())
    }

    fn read_peak_list(&self) -> Result<PeakList, MZEmpCpderError> {
        let mut peaks = read_peaks(&self.input_file)?;
        info!("Read {} peaks", peaks.len());
        if let Some(time_range) = self.time_range {
            peaks = time_range.filter_peaks(peaks);
            info!(
                "{} peaks between {} and {}",
                peaks.len(),
                time_range.start,
                time_range.end
            );
        }
        let peaks = PeakList::new(peaks).map_err(GroupingError::from)?;
        Ok(peaks)
    }

    fn run(&self) -> Result<(), MZEmpCpderError> {
        let start = Instant::now();
        let peaks = self.read_peak_list()?;
        if peaks.is_empty() {
            warn!("No peaks to group");
        }
        match self.method {
            GroupingMethod::Epd => self.run_empirical_compounds(peaks)?,
            GroupingMethod::Trees => self.run_trees(peaks)?,
        }
        let elapsed = Instant::now() - start;
        info!("Total Elapsed Time: {:0.3?}", elapsed);
        Ok(())
    }

    fn run_empirical_compounds(&self, mut peaks: PeakList) -> Result<(), MZEmpCpderError> {
        let mode = self.ion_mode();
        let constructor = EmpiricalCompoundConstructor::new(mode)
            .with_patterns(
                self.patterns.seed_patterns(mode),
                self.patterns.extension_patterns(mode),
            )
            .with_params(self.constructor_params());
        debug!(
            "Using {} seed patterns and {} extension patterns for {mode} mode",
            constructor.seed_patterns.len(),
            constructor.extension_patterns.len()
        );

        let (result, summary) = match self.coelution {
            ArgCoelution::Overlap => constructor.peaks_to_epds(&peaks),
            ArgCoelution::Distance => constructor
                .with_coelution(DistanceCoelution)
                .peaks_to_epds(&peaks),
        };
        info!("Empirical Compounds: {}", summary.compounds);
        info!("Unresolved Peaks: {}", summary.unresolved_peaks);

        let records: Vec<EmpiricalCompoundRecord> = result
            .compounds
            .iter()
            .map(|c| c.to_record(&peaks))
            .collect();
        write_json(&self.output_file, &records)?;

        if let Some(path) = self.annotated_peaks.as_ref() {
            annotate_peaks(&result.compounds, &mut peaks);
            write_json(path, peaks.as_slice())?;
            info!("Annotated peaks written to {}", path.display());
        }
        Ok(())
    }

    fn run_trees(&self, peaks: PeakList) -> Result<(), MZEmpCpderError> {
        let mut assembler = TreeAssembler::new(self.tree_params());
        assembler.isotope_patterns = self.patterns.isotope_patterns();
        assembler.in_source_patterns = self.patterns.graft_patterns();
        if self.derivatization {
            assembler.derivatization_patterns = Some(derivatization_patterns());
        }

        let result = assembler.assemble(&peaks);
        info!("Trees: {}", result.assembly.forest.len());
        info!(
            "In-source Grafts: {} | Unresolved: {}",
            result.in_source.grafted,
            result.in_source.unresolved.len()
        );
        if let Some(report) = result.derivatization.as_ref() {
            info!(
                "Derivatization Grafts: {} | Unresolved: {}",
                report.grafted,
                report.unresolved.len()
            );
        }

        write_output(&self.output_file, |writer| {
            result.assembly.forest.export_tsv(&peaks, writer)
        })?;

        if let Some(path) = self.annotated_peaks.as_ref() {
            warn!(
                "Peak annotation is only available for empirical compounds, not writing {}",
                path.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_model_specific_defaults() {
        let args = MZEmpCpder::parse_from(["mzempcpder", "peaks.json"]);
        assert_eq!(args.constructor_params(), ConstructorParams::default());
        assert_eq!(args.tree_params(), TreeParams::default());

        let args = MZEmpCpder::parse_from([
            "mzempcpder",
            "peaks.json",
            "-i",
            "3",
            "--check-ratio",
            "false",
            "--ownership",
            "prefer-latest",
            "-m",
            "negative",
        ]);
        let params = args.constructor_params();
        assert_eq!(params.search.isotope_rt_tolerance, 3.0);
        assert!(!params.search.check_ratio);
        assert_eq!(params.ownership, mzempcpd::OwnershipPolicy::PreferLatest);
        assert_eq!(args.tree_params().isotope_rt_tolerance, 3.0);
        assert_eq!(args.ion_mode(), IonMode::Negative);
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        assert!(MZEmpCpder::try_parse_from(["mzempcpder", "peaks.json", "-p", "-5"]).is_err());
    }
}
