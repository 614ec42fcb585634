//! Treatment-file ingestion: per-patient dates of radical cystectomy,
//! MVAC chemotherapy and intravesical therapy. Treatments enter the
//! analysis as synthetic diagnosis codes.

use std::path::Path;

use chrono::NaiveDate;
use log::info;
use rustc_hash::FxHashMap;

use crate::error::Result;

/// Treatment dates of one patient.
#[derive(Debug, Clone, Default)]
pub struct TreatmentInfo {
    /// Date of radical cystectomy.
    pub radical_cystectomy: Option<NaiveDate>,
    /// Date of MVAC chemotherapy.
    pub mvac_chemotherapy: Option<NaiveDate>,
    /// Date of intravesical therapy.
    pub intravesical_therapy: Option<NaiveDate>,
}

fn parse_date(field: Option<&str>) -> Option<NaiveDate> {
    let field = field?;
    if field.len() < 10 {
        return None;
    }
    NaiveDate::parse_from_str(&field[..10], "%Y-%m-%d").ok()
}

/// Parse the treatment file into a `source id -> treatment dates` map.
pub fn parse_treatment_file(
    path: impl AsRef<Path>,
) -> Result<FxHashMap<String, TreatmentInfo>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut result = FxHashMap::default();
    for record in reader.records() {
        let record = record?;
        let source_id = record.get(0).unwrap_or_default().to_string();
        result.insert(
            source_id,
            TreatmentInfo {
                radical_cystectomy: parse_date(record.get(10)),
                mvac_chemotherapy: parse_date(record.get(11)),
                intravesical_therapy: parse_date(record.get(13)),
            },
        );
    }
    info!(
        "Parsed treatment dates for {} patients from {}",
        result.len(),
        path.display()
    );
    Ok(result)
}
