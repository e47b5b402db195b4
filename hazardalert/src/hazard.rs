//! Recorded hazards and their identifiers.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::coord::Coordinate;

/// Description read out when a hazard has none.
pub const FALLBACK_DESCRIPTION: &str = "過去に事故が発生しています";

/// A point with recorded hazard history.
///
/// Hazards are appended to the store and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    /// Unique identifier, `<prefix>-<n>`.
    pub id: String,
    /// Where it happened.
    #[serde(flatten)]
    pub coordinate: Coordinate,
    /// Text read out in alerts.
    pub description: String,
    /// `YYYY-MM-DD` or `YYYY-MM`.
    pub occurred_at: String,
    /// Kind of incident (fall, collision, ...).
    #[serde(default)]
    pub category: String,
}

impl Hazard {
    /// The trimmed description, or [`FALLBACK_DESCRIPTION`] if blank.
    #[must_use]
    pub fn spoken_description(&self) -> &str {
        match self.description.trim() {
            "" => FALLBACK_DESCRIPTION,
            desc => desc,
        }
    }
}

static NUMERIC_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)$").unwrap());

/// The numeric part of `id` if it reads `<prefix>-<digits>` at its end.
fn suffix_number(id: &str, prefix: &str) -> Option<u64> {
    let caps = NUMERIC_SUFFIX.captures(id)?;
    let dash = caps.get(0)?.start();

    if !id[..dash].ends_with(prefix) {
        return None;
    }

    caps[1].parse().ok()
}

/// Compute the identifier for the next hazard: one above the largest
/// numeric suffix among ids with the given prefix, starting at 1.
///
/// Not atomic. Two registrations computing an id from the same snapshot get
/// the same id.
///
/// ```
/// # use hazardalert::{next_id, Coordinate, Hazard};
/// let existing = ["acc-3", "acc-12", "other-40"].map(|id| Hazard {
///     id: id.into(),
///     coordinate: Coordinate::new(0., 0.),
///     description: String::new(),
///     occurred_at: "2024-01".into(),
///     category: String::new(),
/// });
/// assert_eq!(next_id("acc", &existing), "acc-13");
/// ```
#[must_use]
pub fn next_id(prefix: &str, existing: &[Hazard]) -> String {
    let max = existing
        .iter()
        .filter_map(|h| suffix_number(&h.id, prefix))
        .max()
        .unwrap_or(0);

    format!("{prefix}-{}", max.saturating_add(1))
}
