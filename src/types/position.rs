//! Position keys: totally ordered byte strings used to order siblings.
//!
//! A key is a base-256 fraction followed by a per-entity suffix. Keys compare
//! lexicographically and never end in a zero byte, so a new key can always be
//! generated strictly between any two distinct keys. The suffix makes
//! collisions between keys generated independently on different clients
//! vanishingly unlikely.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length in bytes of the suffix appended to every generated key.
pub const SUFFIX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey(Vec<u8>);

/// Entity-specific tail of a generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSuffix([u8; SUFFIX_LEN]);

impl PositionSuffix {
    /// Derives the suffix from an entity UUID so the same entity always gets
    /// the same tail.
    pub fn for_uuid(uuid: &Uuid) -> Self {
        let mut bytes = *uuid.as_bytes();
        bytes[SUFFIX_LEN - 1] |= 1;
        Self(bytes)
    }
}

impl PositionKey {
    /// Accepts a key received from the server. Returns `None` for the empty
    /// key or a key ending in a zero byte.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        match bytes.last() {
            Some(&last) if last != 0 => Some(Self(bytes)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key for the first child of an empty folder.
    pub fn initial(suffix: &PositionSuffix) -> Self {
        Self::with_suffix(midpoint(&[], None), suffix)
    }

    /// A key strictly greater than `self`.
    pub fn after(&self, suffix: &PositionSuffix) -> Self {
        Self::with_suffix(midpoint(&self.0, None), suffix)
    }

    /// A key strictly smaller than `self`.
    pub fn before(&self, suffix: &PositionSuffix) -> Self {
        Self::with_suffix(midpoint(&[], Some(&self.0)), suffix)
    }

    /// A key strictly between `lower` and `upper`. If the bounds are not in
    /// ascending order, falls back to a key after `lower`.
    pub fn between(lower: &Self, upper: &Self, suffix: &PositionSuffix) -> Self {
        if lower >= upper {
            return lower.after(suffix);
        }
        Self::with_suffix(midpoint(&lower.0, Some(&upper.0)), suffix)
    }

    /// Generates a key for a slot bounded by optional neighbours.
    pub fn for_slot(
        previous: Option<&PositionKey>,
        next: Option<&PositionKey>,
        suffix: &PositionSuffix,
    ) -> Self {
        match (previous, next) {
            (Some(previous), Some(next)) => Self::between(previous, next, suffix),
            (Some(previous), None) => previous.after(suffix),
            (None, Some(next)) => next.before(suffix),
            (None, None) => Self::initial(suffix),
        }
    }

    fn with_suffix(mut digits: Vec<u8>, suffix: &PositionSuffix) -> Self {
        digits.extend_from_slice(&suffix.0);
        Self(digits)
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Returns digits strictly between `lower` and `upper` (or above `lower` when
/// unbounded) that never end in zero and are never a prefix of `upper`.
///
/// Callers guarantee `lower < upper`.
fn midpoint(lower: &[u8], upper: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut lo = lower;
    let mut hi = upper;

    loop {
        if let Some(h) = hi {
            // Copy the shared prefix, reading missing digits of `lo` as zero.
            let shared = h
                .iter()
                .enumerate()
                .take_while(|&(i, &d)| lo.get(i).copied().unwrap_or(0) == d)
                .count();
            out.extend_from_slice(&h[..shared]);
            lo = lo.get(shared..).unwrap_or(&[]);
            hi = Some(&h[shared..]);
        }

        let digit_lo = lo.first().map_or(0u16, |&d| u16::from(d));
        let digit_hi = hi
            .and_then(|h| h.first())
            .map_or(256u16, |&d| u16::from(d));

        if digit_hi > digit_lo + 1 {
            out.push(((digit_lo + digit_hi) / 2) as u8);
            return out;
        }

        out.push(digit_lo as u8);
        lo = lo.get(1..).unwrap_or(&[]);
        hi = None;
    }
}
