// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Matcher — scans an ordered candidate set, applies the acceptance rule
// combining the three hash distances, and selects the single best candidate
// with deterministic tie-breaking.

use serde::{Deserialize, Serialize};
use tracing::trace;

use doppelbild_core::EngineConfig;

use crate::{Fingerprint, HashCode};

/// One prior fingerprint a new image is compared against.
///
/// `Id` is whatever identity space the caller works in: store row identities
/// during ingestion, a synthetic per-run index during pairwise comparison.
/// The two can never be confused at compile time.
#[derive(Debug, Clone)]
pub struct Candidate<Id> {
    pub id: Id,
    pub phash: HashCode,
    pub dhash: HashCode,
    pub ehash: HashCode,
}

/// Outcome of a successful match: the winning candidate's identity, the
/// three raw distances, and the composite score (lower is stronger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match<Id> {
    pub id: Id,
    pub phash_dist: u32,
    pub dhash_dist: u32,
    pub ehash_dist: u32,
    pub score: u32,
}

/// Duplicate decision engine over a closed candidate list.
///
/// Stateless per call; thresholds are fixed at construction, never read
/// from globals.
#[derive(Debug, Clone)]
pub struct Matcher {
    phash_threshold: u32,
    dhash_threshold: u32,
    ehash_threshold: u32,
}

impl Matcher {
    pub fn new(phash_threshold: u32, dhash_threshold: u32, ehash_threshold: u32) -> Self {
        Self {
            phash_threshold,
            dhash_threshold,
            ehash_threshold,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.phash_threshold,
            config.dhash_threshold,
            config.ehash_threshold,
        )
    }

    /// Scan `candidates` in order and return the accepted candidate with the
    /// lowest composite score, or `None` when nothing is accepted.
    ///
    /// Acceptance: edge-structure agreement alone is convincing
    /// (`d_eh <= ehash_threshold`), or the two tone-sensitive hashes agree
    /// jointly (`d_ph <= phash_threshold && d_dh <= dhash_threshold`).
    /// Rejected candidates are never scored.
    ///
    /// The composite score is `min(d_eh, d_ph + d_dh)` — whichever signal
    /// path is strongest, not a weighted blend. The minimum is tracked with
    /// strict `<`, so on equal scores the candidate seen earlier wins;
    /// iteration order of `candidates` is part of the contract.
    pub fn find_best_match<Id: Copy>(
        &self,
        probe: &Fingerprint,
        candidates: &[Candidate<Id>],
    ) -> Option<Match<Id>> {
        let mut best: Option<Match<Id>> = None;

        for candidate in candidates {
            let d_ph = probe.phash.distance(&candidate.phash);
            let d_dh = probe.dhash.distance(&candidate.dhash);
            let d_eh = probe.ehash.distance(&candidate.ehash);

            let accepted = d_eh <= self.ehash_threshold
                || (d_ph <= self.phash_threshold && d_dh <= self.dhash_threshold);
            if !accepted {
                continue;
            }

            let score = d_eh.min(d_ph + d_dh);
            trace!(d_ph, d_dh, d_eh, score, "candidate accepted");

            if best.as_ref().is_none_or(|b| score < b.score) {
                best = Some(Match {
                    id: candidate.id,
                    phash_dist: d_ph,
                    dhash_dist: d_dh,
                    ehash_dist: d_eh,
                    score,
                });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a 64-bit code with exactly `ones` bits set.
    fn code_with_ones(ones: u32) -> HashCode {
        let bits: Vec<bool> = (0..64).map(|i| i < ones).collect();
        HashCode::from_bits(&bits)
    }

    fn zero_code() -> HashCode {
        code_with_ones(0)
    }

    fn probe() -> Fingerprint {
        Fingerprint {
            phash: zero_code(),
            dhash: zero_code(),
            ehash: zero_code(),
            width: 100,
            height: 100,
        }
    }

    /// Candidate whose three distances from the all-zero probe are exactly
    /// (d_ph, d_dh, d_eh).
    fn candidate(id: u32, d_ph: u32, d_dh: u32, d_eh: u32) -> Candidate<u32> {
        Candidate {
            id,
            phash: code_with_ones(d_ph),
            dhash: code_with_ones(d_dh),
            ehash: code_with_ones(d_eh),
        }
    }

    #[test]
    fn empty_candidate_set_yields_none() {
        let matcher = Matcher::new(8, 10, 10);
        assert!(matcher.find_best_match(&probe(), &[] as &[Candidate<u32>]).is_none());
    }

    #[test]
    fn edge_agreement_alone_is_accepted() {
        let matcher = Matcher::new(8, 10, 10);
        // phash and dhash far over threshold, ehash exactly at it.
        let m = matcher
            .find_best_match(&probe(), &[candidate(1, 40, 40, 10)])
            .expect("edge path must accept");
        assert_eq!(m.id, 1);
        assert_eq!(m.score, 10);
    }

    #[test]
    fn ehash_over_threshold_needs_both_tone_hashes() {
        let matcher = Matcher::new(8, 10, 10);
        // Edge path fails; phash within, dhash over: rejected.
        assert!(matcher
            .find_best_match(&probe(), &[candidate(1, 8, 11, 11)])
            .is_none());
        // Both tone hashes within: accepted despite the edge miss.
        let m = matcher
            .find_best_match(&probe(), &[candidate(2, 8, 10, 11)])
            .unwrap();
        assert_eq!(m.id, 2);
        assert_eq!(m.score, 11.min(8 + 10));
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let matcher = Matcher::new(8, 10, 10);
        assert!(matcher
            .find_best_match(&probe(), &[candidate(1, 30, 30, 10)])
            .is_some());
        assert!(matcher
            .find_best_match(&probe(), &[candidate(1, 30, 30, 11)])
            .is_none());
    }

    #[test]
    fn score_takes_strongest_signal_path() {
        let matcher = Matcher::new(8, 10, 10);
        // Edge distance 9, tone sum 3: score must be 3.
        let m = matcher
            .find_best_match(&probe(), &[candidate(1, 1, 2, 9)])
            .unwrap();
        assert_eq!(m.score, 3);
        assert_eq!(m.phash_dist, 1);
        assert_eq!(m.dhash_dist, 2);
        assert_eq!(m.ehash_dist, 9);
    }

    #[test]
    fn lowest_score_wins_across_candidates() {
        let matcher = Matcher::new(8, 10, 10);
        let cands = vec![candidate(1, 3, 3, 9), candidate(2, 0, 0, 0), candidate(3, 2, 2, 8)];
        let m = matcher.find_best_match(&probe(), &cands).unwrap();
        assert_eq!(m.id, 2);
        assert_eq!(m.score, 0);
    }

    #[test]
    fn first_seen_wins_ties() {
        let matcher = Matcher::new(8, 10, 10);
        // Both candidates score 6; the earlier one must win regardless of id.
        let cands = vec![candidate(42, 3, 3, 6), candidate(7, 3, 3, 6)];
        let m = matcher.find_best_match(&probe(), &cands).unwrap();
        assert_eq!(m.id, 42);

        let reversed = vec![candidate(7, 3, 3, 6), candidate(42, 3, 3, 6)];
        assert_eq!(matcher.find_best_match(&probe(), &reversed).unwrap().id, 7);
    }

    #[test]
    fn raising_thresholds_never_removes_accepted_candidates() {
        let strict = Matcher::new(4, 5, 5);
        let relaxed = Matcher::new(8, 10, 10);
        let cands: Vec<Candidate<u32>> = (0..12)
            .map(|i| candidate(i, i, i, i + 2))
            .collect();

        for cand in &cands {
            let single = std::slice::from_ref(cand);
            if strict.find_best_match(&probe(), single).is_some() {
                assert!(
                    relaxed.find_best_match(&probe(), single).is_some(),
                    "candidate {} accepted at strict thresholds but rejected at relaxed",
                    cand.id
                );
            }
        }
    }
}
