//! Capabilities provided by the platform.
//!
//! Production adapters wrap the device's location, speech and audio APIs;
//! tests plug in deterministic fakes.
use std::time::Duration;

use futures::{future::BoxFuture, stream::BoxStream};
use time::OffsetDateTime;

use crate::{error::LocationError, tracker::PositionFix};

/// How location sources are expected to acquire fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationPolicy {
    /// Ask for GPS-grade accuracy.
    pub high_accuracy: bool,
    /// Oldest cached fix a source may hand out.
    pub max_age: Duration,
    /// Give up on a single request after this long.
    pub timeout: Duration,
}

impl LocationPolicy {
    /// The policy every source in this crate is built for.
    pub const DEFAULT: Self = Self {
        high_accuracy: true,
        max_age: Duration::from_secs(10),
        timeout: Duration::from_secs(15),
    };
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Source of position fixes.
pub trait LocationSource: Send + Sync {
    /// Obtain one fresh fix.
    fn current_position(&self) -> BoxFuture<'static, Result<PositionFix, LocationError>>;

    /// Subscribe to continuous fixes. Dropping the stream unsubscribes.
    fn watch_position(&self) -> BoxStream<'static, Result<PositionFix, LocationError>>;
}

/// Text-to-speech output.
pub trait SpeechSource: Send + Sync {
    /// Speak `text`, cutting off anything still being spoken.
    fn speak(&self, text: &str);

    /// Stop speaking.
    fn cancel(&self);
}

/// Attention tone output.
pub trait ToneSource: Send + Sync {
    /// Play the alert tone. The future resolves once it has finished.
    fn play_alert(&self) -> BoxFuture<'static, ()>;
}

/// Wall clock, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now_ms(&self) -> i64;
}

/// [`Clock`] reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}
