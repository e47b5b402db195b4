//! Text rendered from a ranked hazard list.
//!
//! The phrasing is fixed Japanese; [`compose_alert`] is what gets read out,
//! the other functions feed the on-screen status.
use crate::proximity::RankedHazard;

/// Closing sentence of every spoken alert.
pub const CLOSING: &str = "ご注意ください。";

/// Hint shown when the position fix is older than the staleness window.
pub const STALE_HINT: &str = "位置が古くなっています。更新ボタンを押してください。";

/// Status line when nothing is in range.
pub const ALL_CLEAR: &str = "今、近くに事故履歴はありません。";

/// Distances at or beyond this are not shown in the hazard list.
pub const LIST_DISTANCE_LIMIT_METERS: f64 = 100_000.;

/// Render the spoken alert for `ranked`, nearest first.
///
/// ```
/// # use hazardalert::message::compose_alert;
/// assert_eq!(compose_alert(&[]), "");
/// ```
#[must_use]
pub fn compose_alert(ranked: &[RankedHazard]) -> String {
    match ranked {
        [] => String::new(),
        [only] => format!("{}。{CLOSING}", only.spoken_description()),
        many => {
            let items: Vec<_> = many
                .iter()
                .enumerate()
                .map(|(i, h)| format!("{}件目。{}。", i + 1, h.spoken_description()))
                .collect();

            format!(
                "付近に{}件の事故履歴があります。{}{CLOSING}",
                many.len(),
                items.join(" ")
            )
        }
    }
}

/// Whole meters, as shown to the user.
#[allow(clippy::cast_possible_truncation)]
fn whole_meters(distance: f64) -> i64 {
    distance.round() as i64
}

/// Render the on-screen status line for `ranked`.
#[must_use]
pub fn compose_status(ranked: &[RankedHazard]) -> String {
    match ranked {
        [] => ALL_CLEAR.to_owned(),
        [only] => format!(
            "約{}m先に事故履歴が1件あります。",
            whole_meters(only.distance_meters)
        ),
        [nearest, ..] => format!(
            "付近に事故履歴が{}件あります。最も近いものは約{}m先です。",
            ranked.len(),
            whole_meters(nearest.distance_meters)
        ),
    }
}

/// Render the warning banner, if anything is in range.
#[must_use]
pub fn compose_banner(ranked: &[RankedHazard]) -> Option<String> {
    let nearest = ranked.first()?;
    let others = match ranked.len() - 1 {
        0 => String::new(),
        n => format!("（他{n}件）"),
    };

    Some(format!(
        "約{}m先に事故履歴があります{others}",
        whole_meters(nearest.distance_meters)
    ))
}

/// Distance column of the hazard list. Unknown or very far distances
/// render as a dash.
#[must_use]
pub fn format_list_distance(distance_meters: Option<f64>) -> String {
    match distance_meters {
        Some(d) if d < LIST_DISTANCE_LIMIT_METERS => format!("約{}m", whole_meters(d)),
        _ => "—".to_owned(),
    }
}
