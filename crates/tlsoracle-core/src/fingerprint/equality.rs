//! Fingerprint equality classification.
//!
//! All functions here are pure: the same inputs always produce the same
//! [`EqualityError`], which the leak test relies on when it re-classifies
//! later runs against the first one.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ResponseFingerprint, ResponseMap, VectorId};

/// How two fingerprints differ.
///
/// Only [`EqualityError::None`] means "indistinguishable". [`EqualityError::Unresolved`]
/// is produced when a comparison could not be made because a measurement is
/// missing; it must never be counted as evidence of equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EqualityError {
    None,
    /// One peer reaction left the socket open, the other closed it.
    SocketState,
    /// Alert presence, level or description differs.
    AlertContent,
    /// A different number of messages was received.
    MessageCount,
    /// Same number of messages, different types or order.
    MessageSequence,
    /// Everything matched except the coarse timing bucket.
    Timing,
    /// At least one side of the comparison is absent.
    Unresolved,
}

impl EqualityError {
    /// Whether this value is an actual observed difference.
    pub fn is_difference(self) -> bool {
        !matches!(self, EqualityError::None | EqualityError::Unresolved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EqualityError::None => "NONE",
            EqualityError::SocketState => "SOCKET_STATE",
            EqualityError::AlertContent => "ALERT_CONTENT",
            EqualityError::MessageCount => "MESSAGE_COUNT",
            EqualityError::MessageSequence => "MESSAGE_SEQUENCE",
            EqualityError::Timing => "TIMING",
            EqualityError::Unresolved => "UNRESOLVED",
        }
    }
}

impl fmt::Display for EqualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare two fingerprints, returning the first category that differs.
///
/// Criteria are checked in a fixed order: socket state, alert, message
/// count, message sequence, and finally timing (only when both sides carry a
/// timing bucket).
pub fn compare(a: Option<&ResponseFingerprint>, b: Option<&ResponseFingerprint>) -> EqualityError {
    let (Some(a), Some(b)) = (a, b) else {
        return EqualityError::Unresolved;
    };

    if a.socket_open != b.socket_open {
        return EqualityError::SocketState;
    }
    if (a.alert.is_some() || b.alert.is_some()) && a.alert != b.alert {
        return EqualityError::AlertContent;
    }
    if a.messages.len() != b.messages.len() {
        return EqualityError::MessageCount;
    }
    if a.messages != b.messages {
        return EqualityError::MessageSequence;
    }
    if let (Some(ta), Some(tb)) = (a.timing, b.timing)
        && ta != tb
    {
        return EqualityError::Timing;
    }
    EqualityError::None
}

/// Compare every unordered pair of present fingerprints within one run.
///
/// Pairs are visited in ascending vector identity so the reported category
/// does not depend on the order the executor listed the vectors in. Absent
/// fingerprints are skipped; if no pair could be compared at all the result
/// is [`EqualityError::Unresolved`].
pub fn compare_all(map: &ResponseMap) -> EqualityError {
    let mut present: Vec<(VectorId, &ResponseFingerprint)> = map
        .entries()
        .iter()
        .filter_map(|entry| entry.fingerprint.as_ref().map(|fp| (entry.vector_id, fp)))
        .collect();
    present.sort_by_key(|(id, _)| *id);

    let mut resolved = 0usize;
    for (i, (_, first)) in present.iter().enumerate() {
        for (_, second) in &present[i + 1..] {
            resolved += 1;
            let error = compare(Some(*first), Some(*second));
            if error != EqualityError::None {
                return error;
            }
        }
    }

    if resolved == 0 {
        EqualityError::Unresolved
    } else {
        EqualityError::None
    }
}

/// Outcome of comparing a later run against the reference run, vector by vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapComparison {
    /// Vectors whose fingerprints differ between the two runs.
    pub mismatched: Vec<(VectorId, EqualityError)>,
}

impl MapComparison {
    pub fn is_stable(&self) -> bool {
        self.mismatched.is_empty()
    }
}

/// Compare `candidate` against `reference` at every vector identity of `reference`.
///
/// Pairs with an absent side are skipped; absence is tracked through
/// [`ResponseMap::is_erroneous`]. Callers are expected to have rejected
/// structurally different runs beforehand.
pub fn compare_maps(reference: &ResponseMap, candidate: &ResponseMap) -> MapComparison {
    let mut comparison = MapComparison::default();
    for entry in reference.entries() {
        let other = candidate
            .get(entry.vector_id)
            .and_then(|response| response.fingerprint.as_ref());
        match compare(entry.fingerprint.as_ref(), other) {
            EqualityError::None | EqualityError::Unresolved => {}
            error => comparison.mismatched.push((entry.vector_id, error)),
        }
    }
    comparison
}
