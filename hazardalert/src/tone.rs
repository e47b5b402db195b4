//! The attention tone played alongside spoken alerts.
use std::{future::Future, time::Duration};

use tokio::time;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Extra time a tone may take before playback is considered done anyway.
pub const SAFETY_MARGIN: Duration = Duration::from_millis(150);

/// One beep of a [`TonePattern`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beep {
    /// Pitch.
    pub frequency_hz: f32,
    /// Offset from the start of the pattern.
    pub start: Duration,
    /// How long the beep sounds.
    pub length: Duration,
}

/// A sequence of equally spaced beeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonePattern {
    /// Pitches, played in order.
    pub frequencies_hz: &'static [f32],
    /// Sounding part of each beep.
    pub on: Duration,
    /// Silence after each beep.
    pub off: Duration,
    /// Peak gain of a beep, `0..=1`.
    pub gain: f32,
}

impl TonePattern {
    /// Low-high-low-high, about 1.2 s.
    pub const ALERT: Self = Self {
        frequencies_hz: &[540., 820., 540., 820.],
        on: Duration::from_millis(220),
        off: Duration::from_millis(80),
        gain: 0.14,
    };

    /// Total length including the trailing silence.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.on + self.off) * u32::try_from(self.frequencies_hz.len()).unwrap_or(u32::MAX)
    }

    /// The beeps in playback order.
    pub fn beeps(&self) -> impl Iterator<Item = Beep> + '_ {
        let step = self.on + self.off;

        (0u32..).zip(self.frequencies_hz).map(move |(i, &frequency_hz)| Beep {
            frequency_hz,
            start: step * i,
            length: self.on,
        })
    }
}

impl Default for TonePattern {
    fn default() -> Self {
        Self::ALERT
    }
}

/// Drive `playback` until it finishes or until the pattern's duration plus
/// [`SAFETY_MARGIN`] has passed, whichever comes first.
pub async fn play_with_safety_timeout<F>(pattern: &TonePattern, playback: F)
where
    F: Future<Output = ()>,
{
    if time::timeout(pattern.duration() + SAFETY_MARGIN, playback)
        .await
        .is_err()
    {
        #[cfg(feature = "tracing")]
        debug!("tone playback cut off by safety timeout");
    }
}
