//! Terminal stand-ins for the device's location, speech and audio.
use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use futures::{
    future::{self, BoxFuture},
    stream::BoxStream,
    FutureExt, StreamExt,
};
use hazardalert::{
    source::{LocationPolicy, LocationSource, SpeechSource, ToneSource},
    speech::Voice,
    tone::{play_with_safety_timeout, TonePattern},
    LocationError, PositionFix,
};
use tokio::{
    sync::broadcast,
    time::{self, Instant},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

/// One item of the position feed.
pub type FeedItem = Result<PositionFix, LocationError>;

/// Location source fed from outside, one item at a time.
///
/// One-shot requests are answered with the last fix if it is younger than
/// the policy's max age, otherwise with the next item to arrive, or
/// [`LocationError::Timeout`] after the policy's timeout.
#[derive(Debug)]
pub struct FeedSource {
    tx: broadcast::Sender<FeedItem>,
    last: Arc<Mutex<Option<(Instant, PositionFix)>>>,
    policy: LocationPolicy,
}

impl FeedSource {
    pub fn new(policy: LocationPolicy) -> Self {
        let (tx, _) = broadcast::channel(64);

        Self {
            tx,
            last: Arc::default(),
            policy,
        }
    }

    /// Deliver an item to the active watch and to pending requests.
    pub fn push(&self, item: FeedItem) {
        if let Ok(fix) = item {
            *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some((Instant::now(), fix));
        }

        match self.tx.send(item) {
            Ok(rxs) => debug!(%rxs, "feed item delivered"),
            Err(_) => debug!("feed item with no listener"),
        }
    }

    fn cached(&self) -> Option<PositionFix> {
        let last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        last.and_then(|(at, fix)| (at.elapsed() <= self.policy.max_age).then_some(fix))
    }
}

impl LocationSource for FeedSource {
    fn current_position(&self) -> BoxFuture<'static, FeedItem> {
        if let Some(fix) = self.cached() {
            return future::ready(Ok(fix)).boxed();
        }

        let mut rx = self.tx.subscribe();
        let timeout = self.policy.timeout;

        async move {
            let next = async {
                loop {
                    match rx.recv().await {
                        Ok(item) => return item,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(LocationError::PositionUnavailable)
                        }
                    }
                }
            };

            time::timeout(timeout, next)
                .await
                .unwrap_or(Err(LocationError::Timeout))
        }
        .boxed()
    }

    fn watch_position(&self) -> BoxStream<'static, FeedItem> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|res| future::ready(res.ok()))
            .boxed()
    }
}

/// Prints what would be spoken.
#[derive(Debug)]
pub struct TerminalSpeech {
    voice: Option<Voice>,
}

impl TerminalSpeech {
    pub const fn new(voice: Option<Voice>) -> Self {
        Self { voice }
    }
}

impl SpeechSource for TerminalSpeech {
    fn speak(&self, text: &str) {
        self.cancel();

        match &self.voice {
            Some(voice) => println!("🔊 [{}] {text}", voice.name),
            None => println!("🔊 {text}"),
        }
    }

    fn cancel(&self) {
        debug!("speech cancelled");
    }
}

/// Rings the terminal bell once per beep of the pattern.
#[derive(Debug, Default)]
pub struct TerminalBell {
    pattern: TonePattern,
}

impl ToneSource for TerminalBell {
    fn play_alert(&self) -> BoxFuture<'static, ()> {
        let pattern = self.pattern;

        async move {
            let playback = async move {
                let start = Instant::now();

                for beep in pattern.beeps() {
                    time::sleep_until(start + beep.start).await;
                    debug!(hz = beep.frequency_hz, "beep");

                    let mut stdout = io::stdout();
                    let _ = stdout.write_all(b"\x07").and_then(|_| stdout.flush());
                }

                time::sleep_until(start + pattern.duration()).await;
            };

            play_with_safety_timeout(&pattern, playback).await;
        }
        .boxed()
    }
}
