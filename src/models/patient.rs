//! Patient and diagnosis records.
//!
//! A patient's diagnosis list is sorted by date ascending and deduplicated
//! on `(diagnosis id, date)` before analysis begins. After registry
//! construction patients are shared read-only (`Arc`) across strata, the RR
//! matrix and trajectories; nothing mutates them past that point.

use chrono::{Datelike, NaiveDate};

/// Patient sex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Dense index used for stratum addressing (male = 0, female = 1).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Male => 0,
            Self::Female => 1,
        }
    }
}

/// A single dated, coded diagnosis event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnosis {
    /// Dense diagnosis id in `[0, D)`.
    pub did: u32,
    /// Date of the diagnosis.
    pub date: NaiveDate,
}

/// Fractional-year projection of a date, used for elapsed-time window tests.
#[must_use]
pub fn date_to_years(date: NaiveDate) -> f64 {
    f64::from(date.year()) + f64::from(date.month()) / 12.0 + f64::from(date.day()) / 365.0
}

/// Elapsed time in fractional years from `from` to `to`.
#[must_use]
pub fn elapsed_years(from: NaiveDate, to: NaiveDate) -> f64 {
    date_to_years(to) - date_to_years(from)
}

/// A patient with their full longitudinal diagnosis history.
#[derive(Debug, Clone)]
pub struct Patient {
    /// Dense analysis id, assigned by the registry.
    pub pid: u32,
    /// Identifier from the source data.
    pub source_id: String,
    /// Year of birth.
    pub birth_year: i32,
    /// Patient sex.
    pub sex: Sex,
    /// Age-bucket index in `[0, A)`.
    pub age_bucket: usize,
    /// Region index. Tracked per patient but not part of the stratum index.
    pub region: usize,
    /// Date of death, when known.
    pub death_date: Option<NaiveDate>,
    /// Date of the first event of interest (e.g. cancer onset), when present.
    pub event_of_interest: Option<NaiveDate>,
    /// Diagnoses sorted by date ascending, unique per `(did, date)`.
    pub diagnoses: Vec<Diagnosis>,
}

impl Patient {
    /// Sort the diagnosis list by date and drop duplicate `(did, date)`
    /// entries. Must run before the patient enters any cohort structure.
    pub fn normalize_diagnoses(&mut self) {
        // secondary did key makes equal (did, date) entries adjacent
        self.diagnoses
            .sort_by(|a, b| a.date.cmp(&b.date).then(a.did.cmp(&b.did)));
        self.diagnoses
            .dedup_by(|a, b| a.did == b.did && a.date == b.date);
    }

    /// Whether the patient was ever diagnosed with `did`.
    #[must_use]
    pub fn has_diagnosis(&self, did: u32) -> bool {
        self.diagnoses.iter().any(|d| d.did == did)
    }

    /// Index of the first occurrence of `did` in the diagnosis list.
    #[must_use]
    pub fn first_occurrence(&self, did: u32) -> Option<usize> {
        self.diagnoses.iter().position(|d| d.did == did)
    }

    /// Locate the first `d2` that follows the patient's first `d1` with an
    /// elapsed time inside `[min_years, max_years]`. Returns the absolute
    /// index of the matched `d2`. The search starts strictly after the first
    /// `d1` position, which also covers `d1 == d2` naturally.
    #[must_use]
    pub fn first_pair_match(
        &self,
        d1: u32,
        d2: u32,
        min_years: f64,
        max_years: f64,
    ) -> Option<usize> {
        let start = self.first_occurrence(d1)?;
        self.next_match_after(start, d2, min_years, max_years)
    }

    /// Find the first `did` at an index strictly greater than `idx` whose
    /// date lies within `[min_years, max_years]` of the date at `idx`.
    #[must_use]
    pub fn next_match_after(
        &self,
        idx: usize,
        did: u32,
        min_years: f64,
        max_years: f64,
    ) -> Option<usize> {
        let anchor = date_to_years(self.diagnoses[idx].date);
        for (offset, d) in self.diagnoses[idx + 1..].iter().enumerate() {
            if d.did == did {
                let gap = date_to_years(d.date) - anchor;
                if gap >= min_years && gap <= max_years {
                    return Some(idx + 1 + offset);
                }
            }
        }
        None
    }

    /// Age of the patient at their first diagnosis of `did`.
    #[must_use]
    pub fn age_at_first(&self, did: u32) -> Option<i32> {
        self.first_occurrence(did)
            .map(|i| self.diagnoses[i].date.year() - self.birth_year)
    }

    /// Age of the patient at the event of interest, when recorded.
    #[must_use]
    pub fn age_at_event_of_interest(&self) -> Option<i32> {
        self.event_of_interest.map(|d| d.year() - self.birth_year)
    }
}
