//! Diagnosis dictionary: maps source ICD-10 codes onto dense analysis ids.
//!
//! The dictionary is built from a CCSR-style category CSV, where every
//! ICD-10 code carries up to six clinically meaningful category
//! assignments. Each distinct category becomes one dense diagnosis id, so
//! a single ICD-10 code can map to several ids. Codes from excluded
//! chapters (injuries, external causes, encounter codes, ...) are dropped
//! up front.

use std::path::Path;

use log::info;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{IoResultExt, Result};

/// ICD-10 chapter letters excluded from the analysis.
const EXCLUDED_CHAPTERS: [char; 9] = ['O', 'P', 'R', 'S', 'T', 'V', 'X', 'Y', 'Z'];

/// Synthetic codes for treatment events, appended when treatment data is
/// part of the run.
pub const TREATMENT_CODES: [(&str, &str); 3] = [
    ("C98", "Radical cystectomy (bladder cancer)"),
    ("C99", "MVAC Chemotherapy (bladder cancer)"),
    ("C100", "Intravesical therapy (bladder cancer)"),
];

/// Dense diagnosis dictionary for one analysis run.
#[derive(Debug, Default)]
pub struct DiagnosisDictionary {
    /// `DID -> category name`.
    pub name_map: Vec<String>,
    /// `DID -> representative source code`.
    pub code_map: Vec<String>,
    did_map: FxHashMap<String, SmallVec<[u32; 2]>>,
}

impl DiagnosisDictionary {
    /// Number of dense diagnosis ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.name_map.len()
    }

    /// Whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name_map.is_empty()
    }

    /// Dense ids a source code maps to.
    #[must_use]
    pub fn dids_for(&self, code: &str) -> Option<&[u32]> {
        self.did_map.get(code).map(SmallVec::as_slice)
    }

    /// Build the dictionary from a CCSR category CSV.
    pub fn from_ccsr_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let mut dictionary = Self::default();
        let mut category_ids: FxHashMap<String, u32> = FxHashMap::default();
        let mut codes_seen = 0usize;
        for record in reader.records() {
            let record = record?;
            let Some(code) = record.get(0).and_then(strip_ccsr_quoting) else {
                continue;
            };
            codes_seen += 1;
            if code
                .chars()
                .next()
                .is_some_and(|c| EXCLUDED_CHAPTERS.contains(&c))
            {
                continue;
            }
            let mut dids: SmallVec<[u32; 2]> = SmallVec::new();
            // category id / name column pairs
            for i in (6..=16).step_by(2) {
                let Some(category) = record.get(i) else {
                    break;
                };
                let Some(name) = record.get(i + 1) else {
                    break;
                };
                if name.is_empty() || category == "' '" {
                    continue;
                }
                let did = *category_ids.entry(category.to_string()).or_insert_with(|| {
                    let did = dictionary.name_map.len() as u32;
                    dictionary.name_map.push(name.to_string());
                    dictionary.code_map.push(code.clone());
                    did
                });
                if !dids.contains(&did) {
                    dids.push(did);
                }
            }
            if !dids.is_empty() {
                dictionary.did_map.insert(code, dids);
            }
        }
        info!(
            "Mapped {codes_seen} ICD-10 codes onto {} analysis ids from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    /// Consume the dictionary into its dense name and code maps.
    #[must_use]
    pub fn into_maps(self) -> (Vec<String>, Vec<String>) {
        (self.name_map, self.code_map)
    }

    /// Append the synthetic treatment codes to the dictionary.
    pub fn add_treatment_codes(&mut self) {
        for (code, name) in TREATMENT_CODES {
            let did = self.name_map.len() as u32;
            self.name_map.push(name.to_string());
            self.code_map.push(code.to_string());
            self.did_map.insert(code.to_string(), SmallVec::from_slice(&[did]));
        }
    }
}

/// Turn a CCSR `'A0001'` column value into the dotted ICD-10 form
/// `A00.01`. Returns `None` for values too short to carry a code.
fn strip_ccsr_quoting(field: &str) -> Option<String> {
    if field.len() < 5 {
        return None;
    }
    let inner = &field[1..field.len() - 1];
    let (category, detail) = inner.split_at(3);
    Some(format!("{category}.{detail}"))
}

/// Load the ICD9 to ICD10 mapping from a JSON object file.
pub fn load_icd9_to_icd10_map(path: impl AsRef<Path>) -> Result<FxHashMap<String, String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).with_path(path)?;
    let mapping: FxHashMap<String, String> = serde_json::from_str(&contents)?;
    info!(
        "Loaded {} ICD9 to ICD10 mappings from {}",
        mapping.len(),
        path.display()
    );
    Ok(mapping)
}
