//! Threshold filtering and distance ranking.
use std::ops::Deref;

use crate::{coord::Coordinate, hazard::Hazard};

/// A hazard together with its distance from the current position.
///
/// Always derived from a position; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHazard {
    /// The hazard.
    pub hazard: Hazard,
    /// Distance from the origin it was ranked against (meters).
    pub distance_meters: f64,
}

impl Deref for RankedHazard {
    type Target = Hazard;

    fn deref(&self) -> &Self::Target {
        &self.hazard
    }
}

/// Every hazard ranked by distance from `origin`, nearest first. Hazards at
/// equal distance keep their input order.
#[must_use]
pub fn rank_all(hazards: &[Hazard], origin: &Coordinate) -> Vec<RankedHazard> {
    let mut ranked: Vec<_> = hazards
        .iter()
        .map(|hazard| RankedHazard {
            distance_meters: origin.distance_to(&hazard.coordinate),
            hazard: hazard.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    ranked
}

/// Hazards within `threshold_meters` of `origin` (boundary included),
/// nearest first. Hazards at equal distance keep their input order.
///
/// ```
/// # use hazardalert::{nearby, Coordinate, Hazard};
/// let here = Coordinate::new(37.1788597, 138.9253202);
/// let hazard = Hazard {
///     id: "acc-1".into(),
///     coordinate: here,
///     description: "転落事故".into(),
///     occurred_at: "2024-01".into(),
///     category: String::new(),
/// };
/// let ranked = nearby(&[hazard], &here, 100.);
/// assert_eq!(ranked.len(), 1);
/// assert_eq!(ranked[0].distance_meters, 0.);
/// ```
#[must_use]
pub fn nearby(hazards: &[Hazard], origin: &Coordinate, threshold_meters: f64) -> Vec<RankedHazard> {
    let mut ranked: Vec<_> = hazards
        .iter()
        .filter_map(|hazard| {
            let distance_meters = origin.distance_to(&hazard.coordinate);
            (distance_meters <= threshold_meters).then(|| RankedHazard {
                hazard: hazard.clone(),
                distance_meters,
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    ranked
}
