//! Run configuration: every knob of the analysis pipeline, validated
//! before anything touches the input files.

use std::path::PathBuf;

use crate::error::{Result, TrajanError};

/// Resolved configuration of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Patient information file.
    pub patient_file: PathBuf,
    /// Diagnosis dictionary file (CCSR category CSV).
    pub diagnosis_info_file: PathBuf,
    /// Patient diagnoses file.
    pub diagnoses_file: PathBuf,
    /// Directory all outputs are written into.
    pub output_dir: PathBuf,
    /// Run name; prefixes the output file names.
    pub name: String,
    /// Number of age buckets for stratification.
    pub age_buckets: usize,
    /// Dictionary hierarchy level, recorded for provenance.
    pub level: usize,
    /// Minimum supporting patients per trajectory transition.
    pub min_patients: usize,
    /// Minimum years between consecutive diagnoses.
    pub min_years: f64,
    /// Maximum years between consecutive diagnoses.
    pub max_years: f64,
    /// Maximum trajectory length.
    pub max_trajectory_length: usize,
    /// Minimum trajectory length.
    pub min_trajectory_length: usize,
    /// Optional ICD9 to ICD10 mapping file.
    pub icd9_to_icd10_file: Option<PathBuf>,
    /// Whether to run the clustering stage.
    pub cluster: bool,
    /// Directory holding the MCL binaries.
    pub mcl_path: PathBuf,
    /// Clustering granularities (inflation * 10).
    pub granularities: Vec<usize>,
    /// Monte-Carlo control draws per diagnosis pair.
    pub iterations: usize,
    /// Minimum RR score for pair selection.
    pub min_rr: f64,
    /// Save the RR matrix (and pair patients) to this path.
    pub save_rr: Option<PathBuf>,
    /// Load the RR matrix (and pair patients) from this path.
    pub load_rr: Option<PathBuf>,
    /// Comma-separated patient-filter tokens.
    pub patient_filters: String,
    /// Comma-separated trajectory-filter tokens.
    pub trajectory_filters: String,
    /// Optional tumor-stage file.
    pub tumor_info: Option<PathBuf>,
    /// Optional treatment file.
    pub treatment_info: Option<PathBuf>,
    /// Worker thread count; defaults to the available cores.
    pub threads: Option<usize>,
    /// Optional RNG seed for reproducible sampling.
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            patient_file: PathBuf::new(),
            diagnosis_info_file: PathBuf::new(),
            diagnoses_file: PathBuf::new(),
            output_dir: PathBuf::new(),
            name: "exp1".into(),
            age_buckets: 6,
            level: 3,
            min_patients: 1000,
            min_years: 0.5,
            max_years: 5.0,
            max_trajectory_length: 5,
            min_trajectory_length: 3,
            icd9_to_icd10_file: None,
            cluster: false,
            mcl_path: PathBuf::from("/usr/bin"),
            granularities: vec![40, 60, 80, 100],
            iterations: 10_000,
            min_rr: 1.0,
            save_rr: None,
            load_rr: None,
            patient_filters: "id".into(),
            trajectory_filters: "id".into(),
            tumor_info: None,
            treatment_info: None,
            threads: None,
            seed: None,
        }
    }
}

impl AnalysisConfig {
    /// Check the configuration for internally inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if self.age_buckets == 0 {
            return Err(TrajanError::config("nofAgeGroups must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(TrajanError::config("iter must be at least 1"));
        }
        if self.min_years > self.max_years {
            return Err(TrajanError::config(format!(
                "minYears ({}) exceeds maxYears ({})",
                self.min_years, self.max_years
            )));
        }
        if self.min_trajectory_length < 2 {
            return Err(TrajanError::config(
                "minTrajectoryLength must be at least 2",
            ));
        }
        if self.min_trajectory_length > self.max_trajectory_length {
            return Err(TrajanError::config(format!(
                "minTrajectoryLength ({}) exceeds maxTrajectoryLength ({})",
                self.min_trajectory_length, self.max_trajectory_length
            )));
        }
        if self.threads == Some(0) {
            return Err(TrajanError::config("nrOfThreads must be positive"));
        }
        if self.cluster && self.granularities.is_empty() {
            return Err(TrajanError::config(
                "clustering requires at least one granularity",
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated granularity list such as `40,60,80,100`.
pub fn parse_granularities(value: &str) -> Result<Vec<usize>> {
    value
        .split(',')
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| TrajanError::config(format!("bad cluster granularity: {v}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let cfg = AnalysisConfig {
            min_years: 6.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let cfg = AnalysisConfig {
            threads: Some(0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn granularities_parse() {
        assert_eq!(parse_granularities("40,60").unwrap(), vec![40, 60]);
        assert!(parse_granularities("40,x").is_err());
    }
}
