//! Wiring position, hazards and settings into user-facing alerts.
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::{
    hazard::Hazard,
    message::{compose_alert, compose_banner, compose_status},
    proximity::{rank_all, RankedHazard},
    settings::SettingsHandle,
    source::{SpeechSource, ToneSource},
    tracker::{PositionFix, TrackerState},
};

/// The alert screen's state: which hazards are near, and whether the user
/// can have them read out.
///
/// Nothing is ever played automatically. Entering the radius of a hazard
/// only updates [`Self::nearby`]; playback happens on
/// [`Self::trigger_voice_alert`].
///
/// Distances are recomputed when the position or the hazards change. The
/// threshold is read from the settings on every access, so a change made
/// through any clone of the [`SettingsHandle`] applies immediately.
pub struct AlertSession {
    settings: SettingsHandle,
    speech: Arc<dyn SpeechSource>,
    tone: Arc<dyn ToneSource>,
    hazards: Vec<Hazard>,
    fix: Option<PositionFix>,
    /// Every hazard by distance from `fix`, nearest first.
    ranked: Vec<RankedHazard>,
}

impl std::fmt::Debug for AlertSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSession")
            .field("settings", &self.settings)
            .field("hazards", &self.hazards.len())
            .field("fix", &self.fix)
            .field("nearby", &self.nearby().len())
            .finish_non_exhaustive()
    }
}

impl AlertSession {
    /// Create a session with no position and no hazards.
    #[must_use]
    pub fn new(
        settings: SettingsHandle,
        speech: Arc<dyn SpeechSource>,
        tone: Arc<dyn ToneSource>,
    ) -> Self {
        Self {
            settings,
            speech,
            tone,
            hazards: Vec::new(),
            fix: None,
            ranked: Vec::new(),
        }
    }

    /// The settings this session reads.
    #[must_use]
    pub const fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// The hazards currently known.
    #[must_use]
    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    /// The position the ranking was computed for.
    #[must_use]
    pub const fn position(&self) -> Option<&PositionFix> {
        self.fix.as_ref()
    }

    /// Replace the hazard set and re-rank.
    pub fn set_hazards(&mut self, hazards: Vec<Hazard>) {
        self.hazards = hazards;
        self.refresh();
    }

    /// Take a new position and re-rank.
    pub fn update_position(&mut self, fix: Option<PositionFix>) {
        self.fix = fix;
        self.refresh();
    }

    /// Take the position from a tracker snapshot and re-rank.
    pub fn apply_tracker_state(&mut self, state: &TrackerState) {
        self.update_position(state.fix);
    }

    /// Recompute distances from the current position.
    pub fn refresh(&mut self) {
        self.ranked = match &self.fix {
            Some(fix) => rank_all(&self.hazards, &fix.coordinate),
            None => Vec::new(),
        };
    }

    /// Hazards within the current threshold (boundary included), nearest
    /// first.
    #[must_use]
    pub fn nearby(&self) -> &[RankedHazard] {
        let threshold = f64::from(self.settings.threshold().meters());
        let end = self
            .ranked
            .partition_point(|r| r.distance_meters <= threshold);

        &self.ranked[..end]
    }

    /// The closest hazard in range.
    #[must_use]
    pub fn nearest(&self) -> Option<&RankedHazard> {
        self.nearby().first()
    }

    /// Status line for the current ranking.
    #[must_use]
    pub fn status(&self) -> String {
        compose_status(self.nearby())
    }

    /// Warning banner for the current ranking.
    #[must_use]
    pub fn banner(&self) -> Option<String> {
        compose_banner(self.nearby())
    }

    /// Whether [`Self::trigger_voice_alert`] would play anything.
    #[must_use]
    pub fn can_trigger_voice_alert(&self) -> bool {
        !self.nearby().is_empty() && self.settings.voice_enabled()
    }

    /// Read out the hazards in range and play the attention tone, if voice
    /// is enabled and anything is in range. Otherwise does nothing.
    ///
    /// Speech starts before this returns. The tone runs as its own task and
    /// is not ordered against speech. Must be called from within a Tokio
    /// runtime.
    pub fn trigger_voice_alert(&self) -> bool {
        let nearby = self.nearby();
        let voice_enabled = self.settings.voice_enabled();

        if nearby.is_empty() || !voice_enabled {
            #[cfg(feature = "tracing")]
            debug!(nearby = nearby.len(), voice_enabled, "voice alert suppressed");

            return false;
        }

        let text = compose_alert(nearby);

        #[cfg(feature = "tracing")]
        debug!(nearby = nearby.len(), %text, "voice alert");

        self.speech.speak(&text);
        tokio::spawn(self.tone.play_alert());

        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use futures::{
        future::{self, BoxFuture},
        FutureExt,
    };

    use super::AlertSession;
    use crate::{
        coord::Coordinate,
        hazard::Hazard,
        settings::SettingsHandle,
        source::{SpeechSource, ToneSource},
        tracker::{tests::fix, TrackerState},
    };

    #[derive(Debug, Default)]
    struct FakeSpeech {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechSource for FakeSpeech {
        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_owned());
        }

        fn cancel(&self) {}
    }

    #[derive(Debug, Default)]
    struct FakeTone {
        played: AtomicUsize,
    }

    impl ToneSource for FakeTone {
        fn play_alert(&self) -> BoxFuture<'static, ()> {
            self.played.fetch_add(1, Ordering::SeqCst);
            future::ready(()).boxed()
        }
    }

    const HERE: (f64, f64) = (37.178_859_7, 138.925_320_2);

    fn hazard(id: &str, north_m: f64, description: &str) -> Hazard {
        Hazard {
            id: id.into(),
            coordinate: Coordinate::new(HERE.0 + north_m / 111_194.93, HERE.1),
            description: description.into(),
            occurred_at: "2024-02".into(),
            category: String::new(),
        }
    }

    fn session() -> (Arc<FakeSpeech>, Arc<FakeTone>, AlertSession) {
        let speech = Arc::new(FakeSpeech::default());
        let tone = Arc::new(FakeTone::default());
        let session = AlertSession::new(SettingsHandle::default(), speech.clone(), tone.clone());
        (speech, tone, session)
    }

    #[tokio::test]
    async fn empty_without_fix_or_hazards() {
        let (speech, tone, mut session) = session();

        session.set_hazards(vec![hazard("acc-1", 10., "A")]);
        assert!(session.nearby().is_empty());

        session.set_hazards(Vec::new());
        session.update_position(Some(fix(HERE.0, HERE.1)));
        assert!(session.nearby().is_empty());
        assert!(session.nearest().is_none());

        assert!(!session.trigger_voice_alert());
        assert!(speech.spoken.lock().unwrap().is_empty());
        assert_eq!(tone.played.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ranks_on_position_change() {
        let (_, _, mut session) = session();
        session.set_hazards(vec![
            hazard("acc-1", 80., "A"),
            hazard("acc-2", 150., "B"),
            hazard("acc-3", 30., "C"),
        ]);

        session.apply_tracker_state(&TrackerState {
            fix: Some(fix(HERE.0, HERE.1)),
            ..TrackerState::default()
        });

        let ids: Vec<_> = session.nearby().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["acc-3", "acc-1"]);
        assert_eq!(session.nearest().unwrap().id, "acc-3");
        assert_eq!(
            session.status(),
            "付近に事故履歴が2件あります。最も近いものは約30m先です。"
        );
    }

    #[tokio::test]
    async fn threshold_change_applies_immediately() {
        let (_, _, mut session) = session();
        session.set_hazards(vec![hazard("acc-1", 150., "A")]);
        session.update_position(Some(fix(HERE.0, HERE.1)));
        assert!(session.nearby().is_empty());

        assert!(session.settings().set_threshold_meters(200));
        assert_eq!(session.nearby().len(), 1);

        assert!(!session.settings().set_threshold_meters(500));
        assert_eq!(session.nearby().len(), 1);
    }

    #[tokio::test]
    async fn narrowed_threshold_from_shared_handle_silences_far_hazard() {
        let speech = Arc::new(FakeSpeech::default());
        let tone = Arc::new(FakeTone::default());
        let settings = SettingsHandle::default();
        let ui = settings.clone();
        let mut session = AlertSession::new(settings, speech.clone(), tone.clone());

        assert!(ui.set_threshold_meters(200));
        session.set_hazards(vec![hazard("acc-1", 150., "FAR"), hazard("acc-2", 30., "NEAR")]);
        session.update_position(Some(fix(HERE.0, HERE.1)));
        assert_eq!(session.nearby().len(), 2);

        assert!(ui.set_threshold_meters(50));
        let ids: Vec<_> = session.nearby().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["acc-2"]);

        assert!(session.trigger_voice_alert());
        assert_eq!(*speech.spoken.lock().unwrap(), ["NEAR。ご注意ください。"]);

        session.set_hazards(vec![hazard("acc-1", 150., "FAR")]);
        assert!(!session.trigger_voice_alert());
        assert_eq!(speech.spoken.lock().unwrap().len(), 1);
        assert_eq!(tone.played.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trigger_speaks_composed_alert() {
        let (speech, tone, mut session) = session();
        session.set_hazards(vec![hazard("acc-1", 60., "B"), hazard("acc-2", 20., "A")]);
        session.update_position(Some(fix(HERE.0, HERE.1)));

        assert!(session.can_trigger_voice_alert());
        assert!(session.trigger_voice_alert());

        assert_eq!(
            *speech.spoken.lock().unwrap(),
            ["付近に2件の事故履歴があります。1件目。A。 2件目。B。ご注意ください。"]
        );
        assert_eq!(tone.played.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn voice_disabled_is_noop() {
        let (speech, tone, mut session) = session();
        session.set_hazards(vec![hazard("acc-1", 10., "A")]);
        session.update_position(Some(fix(HERE.0, HERE.1)));
        session.settings().set_voice_enabled(false);

        assert_eq!(session.nearby().len(), 1);
        assert!(!session.can_trigger_voice_alert());
        assert!(!session.trigger_voice_alert());

        assert!(speech.spoken.lock().unwrap().is_empty());
        assert_eq!(tone.played.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn never_plays_on_entry() {
        let (speech, tone, mut session) = session();
        session.set_hazards(vec![hazard("acc-1", 10., "A")]);

        // walk in from ~450 m south
        for step in 0..5 {
            session.update_position(Some(fix(HERE.0 - f64::from(4 - step) * 1e-3, HERE.1)));
        }

        assert_eq!(session.nearby().len(), 1);
        assert_eq!(session.banner().as_deref(), Some("約10m先に事故履歴があります"));
        assert!(speech.spoken.lock().unwrap().is_empty());
        assert_eq!(tone.played.load(Ordering::SeqCst), 0);
    }
}
