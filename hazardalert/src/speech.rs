//! Voice selection for spoken alerts.
use std::str::FromStr;

/// Language alerts are spoken in.
pub const SPEECH_LANG: &str = "ja-JP";

/// Speaking rate relative to the platform default.
pub const SPEECH_RATE: f32 = 1.08;

/// A voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name, e.g. `Google 日本語`.
    pub name: String,
    /// BCP 47 language tag.
    pub lang: String,
}

impl FromStr for Voice {
    type Err = std::convert::Infallible;

    /// Parse `name=lang`. Without `=`, the language is empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, lang) = s.rsplit_once('=').unwrap_or((s, ""));

        Ok(Self {
            name: name.trim().to_owned(),
            lang: lang.trim().to_owned(),
        })
    }
}

fn is_japanese(voice: &Voice) -> bool {
    voice.lang == SPEECH_LANG || voice.lang.starts_with("ja")
}

fn quality(voice: &Voice) -> u8 {
    let name = voice.name.to_lowercase();

    if name.contains("google") {
        3
    } else if name.contains("microsoft") || name.contains("online") {
        2
    } else if name.contains("premium") || name.contains("enhanced") {
        1
    } else {
        0
    }
}

/// Pick the best-sounding Japanese voice. Among equally ranked voices the
/// first listed wins.
#[must_use]
pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    voices
        .iter()
        .filter(|v| is_japanese(v))
        .fold(None, |best: Option<&Voice>, v| match best {
            Some(b) if quality(b) >= quality(v) => Some(b),
            _ => Some(v),
        })
}

#[cfg(test)]
mod tests {
    use super::{select_voice, Voice};

    fn voice(s: &str) -> Voice {
        s.parse().unwrap()
    }

    #[test]
    fn prefers_google_then_microsoft() {
        let voices = [
            voice("Kyoko=ja-JP"),
            voice("Microsoft Nanami Online=ja-JP"),
            voice("Google US English=en-US"),
            voice("Google 日本語=ja-JP"),
        ];
        assert_eq!(select_voice(&voices).unwrap().name, "Google 日本語");

        assert_eq!(
            select_voice(&voices[..3]).unwrap().name,
            "Microsoft Nanami Online"
        );
    }

    #[test]
    fn first_wins_ties() {
        let voices = [voice("Kyoko=ja-JP"), voice("Otoya=ja"), voice("O-ren (Enhanced)=en-GB")];
        assert_eq!(select_voice(&voices).unwrap().name, "Kyoko");
    }

    #[test]
    fn no_japanese_voice() {
        assert_eq!(select_voice(&[voice("Samantha=en-US"), voice("nolang")]), None);
        assert_eq!(select_voice(&[]), None);
    }
}
