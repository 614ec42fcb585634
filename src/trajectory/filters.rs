//! Patient and trajectory filters.
//!
//! Patient filters run on mutable patients before any cohort structure is
//! built; several of them trim the diagnosis list (by age or relative to
//! the event of interest) in addition to deciding membership. Trajectory
//! filters run on finished trajectories after the builder.

use chrono::Datelike;
use rustc_hash::FxHashMap;

use crate::error::{Result, TrajanError};
use crate::experiment::Experiment;
use crate::ingest::tumor::TumorInfo;
use crate::models::{Patient, Sex};
use crate::trajectory::Trajectory;

/// Predicate over a patient; may trim the patient's diagnosis list.
pub type PatientFilter = Box<dyn Fn(&mut Patient) -> bool + Send + Sync>;

/// Predicate over a finished trajectory.
pub type TrajectoryFilter = Box<dyn Fn(&Trajectory) -> bool + Send + Sync>;

/// Keep only patients for which every filter returns true. Filters may
/// mutate the patient (diagnosis-list truncation) as they run.
#[must_use]
pub fn apply_patient_filters(
    patients: Vec<Patient>,
    filters: &[PatientFilter],
) -> Vec<Patient> {
    patients
        .into_iter()
        .filter_map(|mut patient| {
            filters
                .iter()
                .all(|filter| filter(&mut patient))
                .then_some(patient)
        })
        .collect()
}

/// Keep only patients of the given sex.
fn sex_filter(keep: Sex) -> PatientFilter {
    Box::new(move |p| p.sex == keep)
}

/// Keep patients with diagnoses up to the year they turn `age`, trimming
/// everything later.
fn age_below_filter(age: i32) -> PatientFilter {
    Box::new(move |p| {
        let last_year = p.birth_year + age - 1;
        p.diagnoses.retain(|d| d.date.year() <= last_year);
        !p.diagnoses.is_empty()
    })
}

/// Keep patients with diagnoses after they turn `age`, trimming everything
/// earlier.
fn age_above_filter(age: i32) -> PatientFilter {
    Box::new(move |p| {
        let min_year = p.birth_year + age;
        p.diagnoses.retain(|d| d.date.year() > min_year);
        !p.diagnoses.is_empty()
    })
}

/// Keep patients with an event of interest, trimming diagnoses after it.
fn eoi_before_filter() -> PatientFilter {
    Box::new(|p| {
        let Some(eoi) = p.event_of_interest else {
            return false;
        };
        p.diagnoses.retain(|d| d.date <= eoi);
        !p.diagnoses.is_empty()
    })
}

/// Keep patients with an event of interest whose recorded history starts
/// at or after it; any diagnosis predating the event disqualifies the
/// patient. Kept patients retain their full diagnosis list.
fn eoi_after_filter() -> PatientFilter {
    Box::new(|p| {
        let Some(eoi) = p.event_of_interest else {
            return false;
        };
        // list is sorted ascending, so the first entry decides
        p.diagnoses.first().map_or(true, |d| d.date >= eoi)
    })
}

/// Keep patients whose tumor history matches `predicate`.
///
/// The latest matching stage record is selected; when a later stage record
/// exists, diagnoses from that later record's date on are trimmed so the
/// patient only contributes history from the matched stage.
fn tumor_stage_filter(
    tumor_info: FxHashMap<String, Vec<TumorInfo>>,
    predicate: fn(&TumorInfo) -> bool,
) -> PatientFilter {
    Box::new(move |p| {
        let Some(records) = tumor_info.get(&p.source_id) else {
            return false;
        };
        let Some(matched) = records.iter().rposition(predicate) else {
            return false;
        };
        if let Some(next_stage) = records.get(matched + 1) {
            let cutoff = next_stage.date;
            p.diagnoses.retain(|d| d.date < cutoff);
        }
        true
    })
}

/// Build a patient filter from a CLI token. Tumor-stage tokens require the
/// parsed tumor information; unknown tokens are a configuration error.
pub fn patient_filter_from_token(
    token: &str,
    tumor_info: Option<&FxHashMap<String, Vec<TumorInfo>>>,
) -> Result<PatientFilter> {
    let stage = |predicate: fn(&TumorInfo) -> bool| -> Result<PatientFilter> {
        let info = tumor_info.ok_or_else(|| {
            TrajanError::config(format!(
                "patient filter '{token}' requires --tumorInfo"
            ))
        })?;
        Ok(tumor_stage_filter(info.clone(), predicate))
    };
    match token {
        "id" => Ok(Box::new(|_| true)),
        "male" => Ok(sex_filter(Sex::Male)),
        "female" => Ok(sex_filter(Sex::Female)),
        "age70-" => Ok(age_below_filter(70)),
        "age70+" => Ok(age_above_filter(70)),
        "EOI-" => Ok(eoi_before_filter()),
        "EOI+" => Ok(eoi_after_filter()),
        "Ta" => stage(|t| t.t_stage == "Ta"),
        "Tis" => stage(|t| t.t_stage == "Tis"),
        "T1" => stage(|t| matches!(t.t_stage.as_str(), "T1" | "T1a" | "T1c")),
        "T2" => stage(|t| matches!(t.t_stage.as_str(), "T2" | "T2a" | "T2b" | "T2c")),
        "T3" => stage(|t| matches!(t.t_stage.as_str(), "T3" | "T3a" | "T3b")),
        "T4" => stage(|t| matches!(t.t_stage.as_str(), "T4" | "T4a" | "T4b")),
        "N0" => stage(|t| t.n_stage == "N0"),
        "N1" => stage(|t| t.n_stage == "N1"),
        "N2" => stage(|t| t.n_stage == "N2"),
        "N3" => stage(|t| t.n_stage == "N3"),
        "M0" => stage(|t| t.m_stage == "M0"),
        "M1" => stage(|t| matches!(t.m_stage.as_str(), "M1" | "M1a" | "M1b")),
        "NMIBC" => stage(|t| {
            t.t_stage == "Tis"
                || t.t_stage == "Ta"
                || (t.t_stage == "T1" && t.n_stage == "N0" && t.m_stage == "M0")
        }),
        "MIBC" => stage(|t| {
            t.t_stage == "T2"
                || t.t_stage == "T3"
                || (t.t_stage == "T4"
                    && t.m_stage == "M0"
                    && matches!(t.n_stage.as_str(), "N0" | "N1" | "N2" | "N3"))
        }),
        "mUC" => stage(|t| t.m_stage == "M0"),
        _ => Err(TrajanError::config(format!(
            "unknown patient filter token: {token}"
        ))),
    }
}

/// Build the patient filters for a comma-separated token list.
pub fn patient_filters_from_tokens(
    tokens: &str,
    tumor_info: Option<&FxHashMap<String, Vec<TumorInfo>>>,
) -> Result<Vec<PatientFilter>> {
    tokens
        .split(',')
        .filter(|t| !t.is_empty())
        .map(|t| patient_filter_from_token(t.trim(), tumor_info))
        .collect()
}

/// Trajectories containing at least one diagnosis whose medical name
/// mentions a neoplasm.
fn neoplasm_filter(exp: &Experiment) -> TrajectoryFilter {
    let related: Vec<bool> = exp
        .name_map
        .iter()
        .map(|name| {
            name.split_whitespace()
                .any(|word| word.eq_ignore_ascii_case("neoplasm"))
        })
        .collect();
    Box::new(move |t| t.diagnoses.iter().any(|&d| related[d as usize]))
}

/// Trajectories containing at least one bladder-cancer-related code:
/// C67/C77/C78/C79, or the synthetic treatment codes C98/C99/C100.
fn bladder_cancer_filter(exp: &Experiment) -> TrajectoryFilter {
    let related: Vec<bool> = exp
        .code_map
        .iter()
        .map(|code| {
            (code.len() >= 4 && &code[..4] == "C100")
                || (code.len() >= 3
                    && matches!(&code[..3], "C67" | "C77" | "C78" | "C79" | "C98" | "C99"))
        })
        .collect();
    Box::new(move |t| t.diagnoses.iter().any(|&d| related[d as usize]))
}

/// Build a trajectory filter from a CLI token.
pub fn trajectory_filter_from_token(token: &str, exp: &Experiment) -> Result<TrajectoryFilter> {
    match token {
        "id" => Ok(Box::new(|_| true)),
        "neoplasm" => Ok(neoplasm_filter(exp)),
        "bc" => Ok(bladder_cancer_filter(exp)),
        _ => Err(TrajanError::config(format!(
            "unknown trajectory filter token: {token}"
        ))),
    }
}

/// Build the trajectory filters for a comma-separated token list.
pub fn trajectory_filters_from_tokens(
    tokens: &str,
    exp: &Experiment,
) -> Result<Vec<TrajectoryFilter>> {
    tokens
        .split(',')
        .filter(|t| !t.is_empty())
        .map(|t| trajectory_filter_from_token(t.trim(), exp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnosis;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient(sex: Sex, birth_year: i32, years: &[i32]) -> Patient {
        Patient {
            pid: 0,
            source_id: "p".into(),
            birth_year,
            sex,
            age_bucket: 0,
            region: 0,
            death_date: None,
            event_of_interest: None,
            diagnoses: years
                .iter()
                .map(|&y| Diagnosis { did: 0, date: date(y, 6, 1) })
                .collect(),
        }
    }

    #[test]
    fn sex_filters_keep_the_named_sex() {
        let patients = vec![
            patient(Sex::Male, 1950, &[2000]),
            patient(Sex::Female, 1950, &[2000]),
        ];
        let filters = patient_filters_from_tokens("male", None).unwrap();
        let kept = apply_patient_filters(patients, &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].sex, Sex::Male);
    }

    #[test]
    fn age_filters_trim_and_drop() {
        // born 1950: age70- keeps diagnoses up to 2019
        let filters = patient_filters_from_tokens("age70-", None).unwrap();
        let kept = apply_patient_filters(
            vec![patient(Sex::Male, 1950, &[2000, 2019, 2021])],
            &filters,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].diagnoses.len(), 2);
        // a patient with only late diagnoses is dropped entirely
        let filters = patient_filters_from_tokens("age70-", None).unwrap();
        let kept =
            apply_patient_filters(vec![patient(Sex::Male, 1950, &[2021, 2022])], &filters);
        assert!(kept.is_empty());
    }

    #[test]
    fn eoi_filters_require_event_and_trim() {
        let mut with_eoi = patient(Sex::Male, 1950, &[2000, 2010, 2020]);
        with_eoi.event_of_interest = Some(date(2010, 1, 1));
        let without_eoi = patient(Sex::Male, 1950, &[2000]);
        let filters = patient_filters_from_tokens("EOI-", None).unwrap();
        let kept = apply_patient_filters(vec![with_eoi, without_eoi], &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].diagnoses.len(), 1);
    }

    #[test]
    fn eoi_after_drops_patients_with_history_before_the_event() {
        // any diagnosis predating the event disqualifies the patient
        let mut straddling = patient(Sex::Male, 1950, &[2000, 2005, 2010]);
        straddling.event_of_interest = Some(date(2008, 1, 1));
        // a history that starts at the event is kept untrimmed
        let mut post_only = patient(Sex::Male, 1950, &[2010, 2015]);
        post_only.event_of_interest = Some(date(2008, 1, 1));
        let without_eoi = patient(Sex::Male, 1950, &[2010]);
        let filters = patient_filters_from_tokens("EOI+", None).unwrap();
        let kept =
            apply_patient_filters(vec![straddling, post_only, without_eoi], &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].diagnoses.len(), 2);
    }

    #[test]
    fn unknown_token_is_a_config_error() {
        assert!(patient_filters_from_tokens("bogus", None).is_err());
    }

    #[test]
    fn stage_tokens_without_tumor_info_are_config_errors() {
        assert!(patient_filters_from_tokens("T2", None).is_err());
    }
}
