use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::builder::FalseyValueParser;
use clap::Parser;
use log::info;

use trajan::cluster::mcl::MclClusterer;
use trajan::config::{parse_granularities, AnalysisConfig};
use trajan::risk::persist;
use trajan::trajectory::filters::trajectory_filters_from_tokens;
use trajan::trajectory::output::{format_trajectory, write_trajectory_outputs};
use trajan::{build_trajectories, cluster_trajectories, BuildParams, RiskConfig};

/// Patient trajectory analysis: derive statistically significant disease
/// trajectories from longitudinal diagnosis histories.
#[derive(Debug, Parser)]
#[command(name = "trajan", version, about)]
struct Cli {
    /// Patient information file.
    #[arg(env = "PATIENT_FILE")]
    patient_file: PathBuf,

    /// Diagnosis dictionary file (CCSR category CSV).
    #[arg(env = "DIAGNOSIS_INFO_FILE")]
    diagnosis_info_file: PathBuf,

    /// Patient diagnoses file.
    #[arg(env = "DIAGNOSES_FILE")]
    diagnoses_file: PathBuf,

    /// Directory output files are written into.
    #[arg(env = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Number of age buckets used to stratify the population.
    #[arg(long = "nofAgeGroups", default_value_t = 6, env = "NUMBER_OF_AGE_GROUPS")]
    nof_age_groups: usize,

    /// Diagnosis hierarchy level the dictionary was built for.
    #[arg(long = "lvl", default_value_t = 3, env = "LVL")]
    lvl: usize,

    /// Minimum number of patients per trajectory transition.
    #[arg(long = "minPatients", default_value_t = 1000, env = "MIN_PATIENTS")]
    min_patients: usize,

    /// Maximum years between consecutive diagnoses.
    #[arg(long = "maxYears", default_value_t = 5.0, env = "MAX_YEARS")]
    max_years: f64,

    /// Minimum years between consecutive diagnoses.
    #[arg(long = "minYears", default_value_t = 0.5, env = "MIN_YEARS")]
    min_years: f64,

    /// Maximum number of diagnoses in a trajectory.
    #[arg(
        long = "maxTrajectoryLength",
        default_value_t = 5,
        env = "MAX_TRAJECTORY_LENGTH"
    )]
    max_trajectory_length: usize,

    /// Minimum number of diagnoses in a trajectory.
    #[arg(
        long = "minTrajectoryLength",
        default_value_t = 3,
        env = "MIN_TRAJECTORY_LENGTH"
    )]
    min_trajectory_length: usize,

    /// Name of the run; prefixes output file names.
    #[arg(long = "name", default_value = "exp1", env = "NAME")]
    name: String,

    /// JSON file mapping ICD9 codes to ICD10 codes.
    #[arg(long = "ICD9ToICD10File", env = "ICD9_TO_ICD10_FILE")]
    icd9_to_icd10_file: Option<PathBuf>,

    /// Cluster the trajectories and write the cluster outputs.
    #[arg(long = "cluster", env = "CLUSTER", value_parser = FalseyValueParser::new())]
    cluster: bool,

    /// Directory holding the MCL binaries.
    #[arg(long = "mclPath", default_value = "/usr/bin", env = "MCL_PATH")]
    mcl_path: PathBuf,

    /// Comma-separated clustering granularities.
    #[arg(
        long = "clusterGranularities",
        default_value = "40,60,80,100",
        env = "CLUSTER_GRANULARITIES"
    )]
    cluster_granularities: String,

    /// Monte-Carlo control draws per diagnosis pair.
    #[arg(long = "iter", default_value_t = 10_000, env = "ITER")]
    iter: usize,

    /// Minimum RR score for a pair to participate in trajectories.
    #[arg(long = "RR", default_value_t = 1.0, env = "RR")]
    rr: f64,

    /// Save the RR matrix (and pair patient lists) to this path.
    #[arg(long = "saveRR", env = "SAVE_RR")]
    save_rr: Option<PathBuf>,

    /// Load the RR matrix (and pair patient lists) from this path.
    #[arg(long = "loadRR", env = "LOAD_RR")]
    load_rr: Option<PathBuf>,

    /// Comma-separated patient-filter tokens.
    #[arg(long = "pfilters", default_value = "id", env = "PFILTERS")]
    pfilters: String,

    /// Tumor-stage file, required by the stage filter tokens.
    #[arg(long = "tumorInfo", env = "TUMOR_INFO")]
    tumor_info: Option<PathBuf>,

    /// Comma-separated trajectory-filter tokens.
    #[arg(long = "tfilters", default_value = "id", env = "TFILTERS")]
    tfilters: String,

    /// Treatment file; treatments enter the analysis as synthetic codes.
    #[arg(long = "treatmentInfo", env = "TREATMENT_INFO")]
    treatment_info: Option<PathBuf>,

    /// Number of worker threads; defaults to the available cores.
    #[arg(long = "nrOfThreads", env = "NR_OF_THREADS")]
    nr_of_threads: Option<usize>,

    /// Seed for reproducible control sampling; defaults to OS entropy.
    #[arg(long = "seed", env = "SEED")]
    seed: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<AnalysisConfig> {
        let granularities = parse_granularities(&self.cluster_granularities)?;
        Ok(AnalysisConfig {
            patient_file: self.patient_file,
            diagnosis_info_file: self.diagnosis_info_file,
            diagnoses_file: self.diagnoses_file,
            output_dir: self.output_dir,
            name: self.name,
            age_buckets: self.nof_age_groups,
            level: self.lvl,
            min_patients: self.min_patients,
            min_years: self.min_years,
            max_years: self.max_years,
            max_trajectory_length: self.max_trajectory_length,
            min_trajectory_length: self.min_trajectory_length,
            icd9_to_icd10_file: self.icd9_to_icd10_file,
            cluster: self.cluster,
            mcl_path: self.mcl_path,
            granularities,
            iterations: self.iter,
            min_rr: self.rr,
            save_rr: self.save_rr,
            load_rr: self.load_rr,
            patient_filters: self.pfilters,
            trajectory_filters: self.tfilters,
            tumor_info: self.tumor_info,
            treatment_info: self.treatment_info,
            threads: self.nr_of_threads,
            seed: self.seed,
        })
    }
}

fn patients_companion(path: &std::path::Path) -> PathBuf {
    PathBuf::from(format!("{}.patients.csv", path.display()))
}

fn run(cfg: &AnalysisConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating output directory {}", cfg.output_dir.display()))?;
    let (mut experiment, registry) = trajan::load_experiment(cfg)?;

    if let Some(load_path) = &cfg.load_rr {
        persist::load_rr_matrix(&mut experiment, load_path)?;
        persist::load_pair_patients(&mut experiment, &registry, patients_companion(load_path))?;
    } else {
        experiment.estimate_relative_risks(&RiskConfig {
            min_years: cfg.min_years,
            max_years: cfg.max_years,
            iterations: cfg.iterations,
            seed: cfg.seed,
        })?;
    }
    if let Some(save_path) = &cfg.save_rr {
        persist::save_rr_matrix(&experiment, save_path)?;
        persist::save_pair_patients(&experiment, patients_companion(save_path))?;
    }
    experiment.release_cohorts();

    let trajectory_filters = trajectory_filters_from_tokens(&cfg.trajectory_filters, &experiment)?;
    build_trajectories(
        &mut experiment,
        &BuildParams {
            min_patients: cfg.min_patients,
            max_length: cfg.max_trajectory_length,
            min_length: cfg.min_trajectory_length,
            min_years: cfg.min_years,
            max_years: cfg.max_years,
            min_rr: cfg.min_rr,
        },
        &trajectory_filters,
    );
    write_trajectory_outputs(&experiment, &cfg.output_dir)?;
    for trajectory in experiment.trajectories.iter().take(100) {
        info!("{}", format_trajectory(trajectory, &experiment));
    }

    if cfg.cluster {
        let clusterer = MclClusterer::new(&cfg.mcl_path);
        cluster_trajectories(
            &mut experiment,
            &cfg.granularities,
            &cfg.output_dir,
            &clusterer,
        )?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let cfg = cli.into_config()?;
    cfg.validate()?;
    if let Some(threads) = cfg.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("sizing the worker pool")?;
    }
    run(&cfg)
}
