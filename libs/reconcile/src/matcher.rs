//! NIC diff and request matching.
//!
//! Pure functions over snapshots: no I/O, deterministic for the same inputs.

use std::collections::HashSet;

use crate::nic::{NicDescriptor, NicRequest};

/// NICs attached before a mutation was issued.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    nics: HashSet<NicDescriptor>,
}

impl ReferenceSet {
    /// Returns true if `nic` was already attached, compared by canonical form.
    pub fn contains(&self, nic: &NicDescriptor) -> bool {
        self.nics.contains(nic)
    }

    pub fn len(&self) -> usize {
        self.nics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nics.is_empty()
    }
}

impl FromIterator<NicDescriptor> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = NicDescriptor>>(iter: I) -> Self {
        Self {
            nics: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a NicDescriptor> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = &'a NicDescriptor>>(iter: I) -> Self {
        iter.into_iter().cloned().collect()
    }
}

/// Result of comparing a fresh snapshot against the reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome<'a> {
    /// Nothing new is attached yet.
    NoNewNics,

    /// New NICs exist but none carries every requested pair.
    Unmatched { new_nics: usize },

    /// First new NIC, in snapshot order, satisfying the request.
    Matched(&'a NicDescriptor),
}

impl<'a> MatchOutcome<'a> {
    pub fn matched(self) -> Option<&'a NicDescriptor> {
        match self {
            Self::Matched(nic) => Some(nic),
            _ => None,
        }
    }
}

/// NICs in `current` that are not in `reference`, in snapshot order.
pub fn new_nics<'a>(
    reference: &ReferenceSet,
    current: &'a [NicDescriptor],
) -> Vec<&'a NicDescriptor> {
    current
        .iter()
        .filter(|nic| !reference.contains(nic))
        .collect()
}

/// Diff `current` against `reference` and look for the requested NIC.
///
/// When several new NICs satisfy the request the first one wins. Two NICs
/// requested with identical pairs on the same router are indistinguishable, so
/// callers must not run overlapping attaches against one router.
pub fn classify<'a>(
    reference: &ReferenceSet,
    current: &'a [NicDescriptor],
    request: &NicRequest,
) -> MatchOutcome<'a> {
    let added = new_nics(reference, current);
    if added.is_empty() {
        return MatchOutcome::NoNewNics;
    }

    match added.iter().copied().find(|nic| request.is_satisfied_by(nic)) {
        Some(nic) => MatchOutcome::Matched(nic),
        None => MatchOutcome::Unmatched {
            new_nics: added.len(),
        },
    }
}

/// The newly attached NIC matching `request`, if any.
pub fn diff_and_match<'a>(
    reference: &ReferenceSet,
    current: &'a [NicDescriptor],
    request: &NicRequest,
) -> Option<&'a NicDescriptor> {
    classify(reference, current, request).matched()
}
