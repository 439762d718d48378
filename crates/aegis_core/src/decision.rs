//! Consecutive-run decision rule over a fingerprint sequence.

use crate::chunker::Fingerprint;
use crate::filter::MembershipFilter;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    NotPresent,
    MaybePresent,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::NotPresent => "NOT_PRESENT",
            Verdict::MaybePresent => "MAYBE_PRESENT",
        }
    }

    pub fn is_maybe_present(self) -> bool { self == Verdict::MaybePresent }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `MaybePresent` as soon as `threshold` consecutive chunks all hit.
///
/// Sequences shorter than `threshold` are `NotPresent` without probing.
/// A `threshold` of 0 is treated as 1.
pub fn evaluate<F: MembershipFilter>(chunks: &[Fingerprint], filter: &F, threshold: usize) -> Verdict {
    let threshold = threshold.max(1);
    if chunks.len() < threshold {
        return Verdict::NotPresent;
    }
    let mut run = 0usize;
    for fp in chunks {
        if filter.contains(fp) {
            run += 1;
            if run >= threshold {
                return Verdict::MaybePresent;
            }
        } else {
            run = 0;
        }
    }
    Verdict::NotPresent
}
