//! Session-wide user settings.
//!
//! Settings live in memory for one application session. A
//! [`SettingsHandle`] is created once and cloned into every component that
//! reads or changes them.
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

/// Notification radius. Only these values can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Threshold {
    /// 50 m.
    Near,
    /// 100 m.
    #[default]
    Medium,
    /// 200 m.
    Far,
}

impl Threshold {
    /// All selectable thresholds, smallest first.
    pub const ALL: [Self; 3] = [Self::Near, Self::Medium, Self::Far];

    /// The radius in meters.
    #[must_use]
    pub const fn meters(self) -> u32 {
        match self {
            Self::Near => 50,
            Self::Medium => 100,
            Self::Far => 200,
        }
    }

    /// The threshold with exactly this radius, if it is selectable.
    #[must_use]
    pub const fn from_meters(meters: u32) -> Option<Self> {
        match meters {
            50 => Some(Self::Near),
            100 => Some(Self::Medium),
            200 => Some(Self::Far),
            _ => None,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

/// A snapshot of the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Whether spoken alerts may be played.
    pub voice_enabled: bool,
    /// Notification radius.
    pub threshold: Threshold,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voice_enabled: true,
            threshold: Threshold::default(),
        }
    }
}

/// Shared, mutable access to the session's [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle(Arc<Mutex<Settings>>);

impl SettingsHandle {
    /// Create a handle holding `settings`.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(Mutex::new(settings)))
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        // settings are plain values, a poisoned lock still holds a valid one
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current settings.
    #[must_use]
    pub fn get(&self) -> Settings {
        *self.lock()
    }

    /// Whether spoken alerts may be played.
    #[must_use]
    pub fn voice_enabled(&self) -> bool {
        self.lock().voice_enabled
    }

    /// Current notification radius.
    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.lock().threshold
    }

    /// Enable or disable spoken alerts.
    pub fn set_voice_enabled(&self, enabled: bool) {
        self.lock().voice_enabled = enabled;
    }

    /// Flip spoken alerts, returning the new state.
    pub fn toggle_voice(&self) -> bool {
        let mut settings = self.lock();
        settings.voice_enabled = !settings.voice_enabled;
        settings.voice_enabled
    }

    /// Select the radius with exactly `meters`. Anything other than a
    /// selectable radius leaves the current one in place and returns `false`.
    pub fn set_threshold_meters(&self, meters: u32) -> bool {
        Threshold::from_meters(meters).map_or(false, |threshold| {
            self.lock().threshold = threshold;
            true
        })
    }
}
