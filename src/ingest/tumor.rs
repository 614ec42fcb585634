//! Tumor-stage ingestion.
//!
//! The tumor CSV records per-patient staging observations over time. Only
//! bladder-tumor rows (site `C67`) are kept. The `T`, `N` and `M`
//! components arrive as `<text>_<stage>` fields; rows missing any
//! component are skipped. The overall stage is derived from the three
//! components with the standard bladder-cancer staging table.

use std::path::Path;

use chrono::NaiveDate;
use log::info;
use rustc_hash::FxHashMap;

use crate::error::Result;

/// One staging observation for a patient.
#[derive(Debug, Clone)]
pub struct TumorInfo {
    /// Tumor-size stage (`Ta`, `Tis`, `T1`..`T4b`).
    pub t_stage: String,
    /// Lymph-node stage (`N0`..`N3`).
    pub n_stage: String,
    /// Metastasis stage (`M0`, `M1`, `M1a`, `M1b`).
    pub m_stage: String,
    /// Derived overall stage.
    pub stage: String,
    /// Observation date.
    pub date: NaiveDate,
}

/// Derive the overall bladder-cancer stage from the TNM components.
#[must_use]
pub fn tumor_stage(t_stage: &str, n_stage: &str, m_stage: &str) -> String {
    if n_stage == "N0" && m_stage == "M0" {
        match t_stage {
            "Ta" => return "0a".into(),
            "Tis" => return "0is".into(),
            "T1" => return "I".into(),
            "T2" => return "II".into(),
            "T3a" | "T3b" | "T4a" => return "IIIA".into(),
            _ => {}
        }
    }
    if n_stage == "N1"
        && m_stage == "M0"
        && matches!(
            t_stage,
            "T1" | "T1a" | "T1b" | "T2" | "T2a" | "T2b" | "T3" | "T3a" | "T3b" | "T4a"
        )
    {
        return "IIIA".into();
    }
    if (n_stage == "N2" || n_stage == "N3")
        && m_stage == "M0"
        && matches!(
            t_stage,
            "T1" | "T1a" | "T1b" | "T2" | "T2a" | "T2b" | "T3" | "T3a" | "T3b" | "T4" | "T4a"
        )
    {
        return "IIIB".into();
    }
    if t_stage == "T4b" && m_stage == "M0" {
        return "IVA".into();
    }
    match m_stage {
        "M1a" => "IVA".into(),
        "M1b" => "IVB".into(),
        _ => format!("{t_stage}{n_stage}{m_stage}"),
    }
}

/// The `<text>_<stage>` component fields carry the stage after the
/// underscore.
fn stage_component(field: &str) -> Option<&str> {
    let (_, stage) = field.split_once('_')?;
    Some(stage)
}

/// Parse the tumor file into per-patient chronological staging lists.
pub fn parse_tumor_file(
    path: impl AsRef<Path>,
) -> Result<FxHashMap<String, Vec<TumorInfo>>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut result: FxHashMap<String, Vec<TumorInfo>> = FxHashMap::default();
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record?;
        let site = record.get(4).unwrap_or_default();
        if site.split('.').next() != Some("C67") {
            continue;
        }
        let Some(date) = record
            .get(1)
            .and_then(|f| NaiveDate::parse_from_str(f.get(0..10)?, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let (Some(t_stage), Some(n_stage), Some(m_stage)) = (
            record.get(10).and_then(stage_component),
            record.get(11).and_then(stage_component),
            record.get(12).and_then(stage_component),
        ) else {
            continue;
        };
        rows += 1;
        let stage = tumor_stage(t_stage, n_stage, m_stage);
        result
            .entry(record.get(0).unwrap_or_default().to_string())
            .or_default()
            .push(TumorInfo {
                t_stage: t_stage.to_string(),
                n_stage: n_stage.to_string(),
                m_stage: m_stage.to_string(),
                stage,
                date,
            });
    }
    info!(
        "Parsed {rows} tumor-stage observations for {} patients from {}",
        result.len(),
        path.display()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stage_table_covers_the_main_cases() {
        assert_eq!(tumor_stage("Ta", "N0", "M0"), "0a");
        assert_eq!(tumor_stage("Tis", "N0", "M0"), "0is");
        assert_eq!(tumor_stage("T1", "N0", "M0"), "I");
        assert_eq!(tumor_stage("T2", "N1", "M0"), "IIIA");
        assert_eq!(tumor_stage("T3", "N2", "M0"), "IIIB");
        assert_eq!(tumor_stage("T4b", "N1", "M0"), "IVA");
        assert_eq!(tumor_stage("T2", "N0", "M1b"), "IVB");
        assert_eq!(tumor_stage("T9", "N9", "M9"), "T9N9M9");
    }

    #[test]
    fn parses_bladder_rows_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "s1,2020-01-01,,,C67.2,,,,,,size_T2,nodes_N0,meta_M0"
        )
        .unwrap();
        writeln!(
            file,
            "s1,2021-01-01,,,C67.2,,,,,,size_T3,nodes_N1,meta_M0"
        )
        .unwrap();
        writeln!(file, "s2,2020-01-01,,,C50.1,,,,,,size_T2,nodes_N0,meta_M0").unwrap();
        writeln!(file, "s3,2020-01-01,,,C67.2,,,,,,incomplete,nodes_N0,meta_M0").unwrap();
        let info = parse_tumor_file(file.path()).unwrap();
        assert_eq!(info.len(), 1);
        let stages = &info["s1"];
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage, "II");
        assert_eq!(stages[1].t_stage, "T3");
    }
}
