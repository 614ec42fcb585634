//! Selection of the ordered diagnosis pairs that seed trajectory building.
//!
//! A direction qualifies when its follower count reaches `min_patients`
//! and its RR exceeds `min_rr`. When both directions of an unordered pair
//! qualify, a binomial tail test on the follower counts decides whether
//! the dominant direction is significantly dominant; if not, the pair is
//! dropped entirely.

use log::info;

use crate::experiment::Experiment;
use crate::stats::binomial_tail;
use crate::trajectory::Pair;

/// Significance threshold for the directional asymmetry test.
const ASYMMETRY_ALPHA: f64 = 0.05;

/// Pick the ordered pairs that qualify for trajectory building.
#[must_use]
pub fn select_pairs(exp: &Experiment, min_patients: usize, min_rr: f64) -> Vec<Pair> {
    info!("Selecting diagnosis pairs for trajectory building");
    let n = exp.n_codes as u32;
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let forward = exp.risk.support(i, j);
            let reverse = exp.risk.support(j, i);
            let forward_ok = forward >= min_patients && exp.risk.rr(i, j) > min_rr;
            let reverse_ok = reverse >= min_patients && exp.risk.rr(j, i) > min_rr;
            match (forward_ok, reverse_ok) {
                (true, true) => {
                    let (dominant, winner) = if forward > reverse {
                        (forward, Pair { first: i, second: j })
                    } else {
                        (reverse, Pair { first: j, second: i })
                    };
                    // one direction with zero followers is total dominance
                    let significant = dominant == forward + reverse
                        || binomial_tail(0.5, forward + reverse, dominant) < ASYMMETRY_ALPHA;
                    if significant {
                        pairs.push(winner);
                    }
                }
                (true, false) => pairs.push(Pair { first: i, second: j }),
                (false, true) => pairs.push(Pair { first: j, second: i }),
                (false, false) => {}
            }
        }
    }
    info!("Found {} suitable diagnosis pairs", pairs.len());
    pairs
}
