//! Diagnosis-file ingestion: fills the parsed patients with dated, coded
//! diagnoses and tags events of interest.
//!
//! The diagnosis CSV carries the patient id, the code system, the code and
//! the date. Non-ICD-10-CM rows are remapped through the optional ICD9 to
//! ICD10 table or skipped. Codes absent from the dictionary (excluded
//! chapters) are tallied as excluded. Every patient's diagnosis list is
//! sorted and deduplicated afterwards.

use std::path::Path;

use chrono::NaiveDate;
use log::info;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::ingest::dictionary::DiagnosisDictionary;
use crate::ingest::treatments::TreatmentInfo;
use crate::models::{Diagnosis, Patient};

/// Tallies of one diagnosis-file pass.
#[derive(Debug, Default)]
pub struct DiagnosisStats {
    /// Total records read.
    pub parsed: usize,
    /// Records remapped from ICD9.
    pub icd9_remapped: usize,
    /// Records whose code is not part of the analysis dictionary.
    pub excluded: usize,
    /// Records skipped for unknown patients, unknown code systems or
    /// unparseable dates.
    pub skipped: usize,
    /// Events of interest tagged.
    pub events_of_interest: usize,
}

/// Whether a code marks the event of interest (bladder-cancer onset).
#[must_use]
pub fn is_event_of_interest(code: &str) -> bool {
    code == "Z85.1" || code.starts_with("C67")
}

/// Parse a `YYYY-MM-DD` date field, tolerating trailing timestamp text.
fn parse_diagnosis_date(field: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(field.get(0..10)?, "%Y-%m-%d").ok()
}

/// Fill `patients` with the diagnoses found in `path`.
pub fn parse_diagnosis_file(
    path: impl AsRef<Path>,
    patients: &mut [Patient],
    index: &FxHashMap<String, usize>,
    dictionary: &DiagnosisDictionary,
    icd9_to_icd10: &FxHashMap<String, String>,
) -> Result<DiagnosisStats> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut stats = DiagnosisStats::default();
    for record in reader.records() {
        let record = record?;
        stats.parsed += 1;
        let Some(&patient_idx) = record.get(0).and_then(|id| index.get(id)) else {
            stats.skipped += 1;
            continue;
        };
        let system = record.get(2).unwrap_or_default();
        let mut code = record.get(3).unwrap_or_default();
        if system != "ICD-10-CM" {
            match icd9_to_icd10.get(code) {
                Some(remapped) => {
                    code = remapped;
                    stats.icd9_remapped += 1;
                }
                None => {
                    stats.skipped += 1;
                    continue;
                }
            }
        }
        let Some(date) = record.get(7).and_then(parse_diagnosis_date) else {
            stats.skipped += 1;
            continue;
        };
        let patient = &mut patients[patient_idx];
        match dictionary.dids_for(code) {
            Some(dids) => {
                for &did in dids {
                    patient.diagnoses.push(Diagnosis { did, date });
                }
            }
            None => {
                stats.excluded += 1;
                continue;
            }
        }
        if patient.event_of_interest.is_none() && is_event_of_interest(code) {
            patient.event_of_interest = Some(date);
            stats.events_of_interest += 1;
        }
    }
    info!(
        "Parsed {} diagnosis records from {}: {} ICD9-remapped, {} excluded, {} skipped, {} events of interest",
        stats.parsed,
        path.display(),
        stats.icd9_remapped,
        stats.excluded,
        stats.skipped,
        stats.events_of_interest
    );
    Ok(stats)
}

/// Append the synthetic treatment diagnoses to each treated patient.
pub fn fill_treatment_diagnoses(
    patients: &mut [Patient],
    index: &FxHashMap<String, usize>,
    treatments: &FxHashMap<String, TreatmentInfo>,
    dictionary: &DiagnosisDictionary,
) -> usize {
    let mut filled = 0usize;
    for (source_id, info) in treatments {
        let Some(&patient_idx) = index.get(source_id) else {
            continue;
        };
        let patient = &mut patients[patient_idx];
        let events = [
            (info.radical_cystectomy, "C98"),
            (info.mvac_chemotherapy, "C99"),
            (info.intravesical_therapy, "C100"),
        ];
        let mut any = false;
        for (date, code) in events {
            let Some(date) = date else { continue };
            if let Some(dids) = dictionary.dids_for(code) {
                for &did in dids {
                    patient.diagnoses.push(Diagnosis { did, date });
                }
                any = true;
            }
        }
        if any {
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sex;
    use std::io::Write;

    fn patient(source_id: &str) -> Patient {
        Patient {
            pid: 0,
            source_id: source_id.into(),
            birth_year: 1950,
            sex: Sex::Male,
            age_bucket: 0,
            region: 0,
            death_date: None,
            event_of_interest: None,
            diagnoses: Vec::new(),
        }
    }

    fn dictionary() -> DiagnosisDictionary {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        writeln!(
            file,
            "'C6700',bladder,X,Y,X,Y,NEO066,Bladder neoplasm,,,,,,,,,,"
        )
        .unwrap();
        writeln!(
            file,
            "'A0001',cholera,X,Y,X,Y,INF001,Intestinal infection,,,,,,,,,,"
        )
        .unwrap();
        DiagnosisDictionary::from_ccsr_file(file.path()).unwrap()
    }

    #[test]
    fn fills_diagnoses_and_tags_events() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s1,x,ICD-10-CM,A00.01,,,,2019-03-05").unwrap();
        writeln!(file, "s1,x,ICD-10-CM,C67.00,,,,2020-03-05").unwrap();
        writeln!(file, "s1,x,ICD-9,123,,,,2020-03-05").unwrap();
        writeln!(file, "s2,x,ICD-10-CM,A00.01,,,,bad-date").unwrap();
        writeln!(file, "unknown,x,ICD-10-CM,A00.01,,,,2019-03-05").unwrap();
        let mut patients = vec![patient("s1"), patient("s2")];
        let index: FxHashMap<String, usize> = patients
            .iter()
            .enumerate()
            .map(|(i, p)| (p.source_id.clone(), i))
            .collect();
        let stats = parse_diagnosis_file(
            file.path(),
            &mut patients,
            &index,
            &dictionary(),
            &FxHashMap::default(),
        )
        .unwrap();
        assert_eq!(stats.parsed, 5);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.events_of_interest, 1);
        assert_eq!(patients[0].diagnoses.len(), 2);
        assert!(patients[0].event_of_interest.is_some());
        assert!(patients[1].diagnoses.is_empty());
    }
}
