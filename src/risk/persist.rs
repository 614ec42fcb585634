//! Save and load of the RR matrix and its companion pair patient lists.
//!
//! The RR file holds one `name1 \t name2 \t RR` line per cell, with the RR
//! in scientific notation. The companion file holds one
//! `name1 \t name2 \t pid,pid,...` line per pair with at least one
//! follower, using source patient ids. Loading resolves names through the
//! experiment's dictionary and fails when a name is unknown, which guards
//! against loading a matrix produced with a different dictionary.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::error::{IoResultExt, Result, TrajanError};
use crate::experiment::Experiment;
use crate::models::PatientRegistry;

fn name_lookup(exp: &Experiment) -> FxHashMap<String, u32> {
    exp.name_map
        .iter()
        .enumerate()
        .map(|(did, name)| (name.clone(), did as u32))
        .collect()
}

/// Write every scored RR cell to `path`. Cells still at the neutral 1.0
/// are omitted; loading leaves them at their default.
pub fn save_rr_matrix(exp: &Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for d1 in 0..exp.n_codes as u32 {
        for d2 in 0..exp.n_codes as u32 {
            let rr = exp.risk.rr(d1, d2);
            if rr == 1.0 {
                continue;
            }
            writeln!(out, "{}\t{}\t{rr:E}", exp.name_of(d1), exp.name_of(d2))
                .with_path(path)?;
        }
    }
    out.flush().with_path(path)?;
    info!("Saved RR matrix to {}", path.display());
    Ok(())
}

/// Write the follower lists of all supported pairs to `path`.
pub fn save_pair_patients(exp: &Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for d1 in 0..exp.n_codes as u32 {
        for d2 in 0..exp.n_codes as u32 {
            let patients = exp.risk.pair_patients(d1, d2);
            if patients.is_empty() {
                continue;
            }
            let ids: Vec<&str> = patients.iter().map(|p| p.source_id.as_str()).collect();
            writeln!(
                out,
                "{}\t{}\t{}",
                exp.name_of(d1),
                exp.name_of(d2),
                ids.join(",")
            )
            .with_path(path)?;
        }
    }
    out.flush().with_path(path)?;
    info!("Saved pair patient lists to {}", path.display());
    Ok(())
}

fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut fields = line.split('\t');
    let a = fields.next()?;
    let b = fields.next()?;
    let c = fields.next()?;
    Some((a, b, c))
}

/// Load an RR matrix written by [`save_rr_matrix`] into the experiment.
pub fn load_rr_matrix(exp: &mut Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let lookup = name_lookup(exp);
    let reader = BufReader::new(File::open(path).with_path(path)?);
    let mut cells = 0usize;
    for line in reader.lines() {
        let line = line.with_path(path)?;
        let Some((name1, name2, value)) = split_line(&line) else {
            continue;
        };
        let d1 = *lookup
            .get(name1)
            .ok_or_else(|| TrajanError::UnknownDiagnosis(name1.to_string()))?;
        let d2 = *lookup
            .get(name2)
            .ok_or_else(|| TrajanError::UnknownDiagnosis(name2.to_string()))?;
        let rr: f64 = value
            .parse()
            .map_err(|_| TrajanError::config(format!("unparseable RR value: {value}")))?;
        exp.risk.set_rr(d1, d2, rr);
        cells += 1;
    }
    info!("Loaded {} RR cells from {}", cells, path.display());
    Ok(())
}

/// Load the pair patient lists written by [`save_pair_patients`],
/// resolving source patient ids through the registry.
pub fn load_pair_patients(
    exp: &mut Experiment,
    registry: &PatientRegistry,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let lookup = name_lookup(exp);
    let reader = BufReader::new(File::open(path).with_path(path)?);
    let mut pairs = 0usize;
    let mut unknown_patients = 0usize;
    for line in reader.lines() {
        let line = line.with_path(path)?;
        let Some((name1, name2, ids)) = split_line(&line) else {
            continue;
        };
        let d1 = *lookup
            .get(name1)
            .ok_or_else(|| TrajanError::UnknownDiagnosis(name1.to_string()))?;
        let d2 = *lookup
            .get(name2)
            .ok_or_else(|| TrajanError::UnknownDiagnosis(name2.to_string()))?;
        let mut patients = Vec::new();
        for id in ids.split(',').filter(|id| !id.is_empty()) {
            match registry.get_by_source_id(id) {
                Some(patient) => patients.push(patient.clone()),
                None => unknown_patients += 1,
            }
        }
        exp.risk.set_pair_patients(d1, d2, patients);
        pairs += 1;
    }
    if unknown_patients > 0 {
        warn!(
            "Skipped {unknown_patients} patient ids from {} that are not in the current population",
            path.display()
        );
    }
    info!("Loaded {} pair patient lists from {}", pairs, path.display());
    Ok(())
}
