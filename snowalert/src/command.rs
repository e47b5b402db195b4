//! Lines read from stdin: position feed items and user commands.
use std::str::FromStr;

use hazardalert::{Coordinate, LocationError, PositionFix};
use serde::Deserialize;
use thiserror::Error;

use crate::adapters::FeedItem;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("bad feed line: {0}")]
    Feed(#[from] serde_json::Error),
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSwitch {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A position feed item. Fixes without a timestamp are stamped on receipt.
    Feed(FeedItem),
    Play,
    Refresh,
    Voice(VoiceSwitch),
    Threshold(u32),
    Status,
    List,
    Add {
        occurred_at: String,
        coordinate: Coordinate,
        description: String,
    },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  {\"latitude\":..,\"longitude\":..}   feed a position fix
  {\"error\":\"timeout\"}              feed a location failure
  play                              read out nearby hazards
  refresh                           request a fresh position
  voice on|off|toggle               enable or disable voice alerts
  threshold 50|100|200              set the alert radius (meters)
  status                            show the current status
  list                              list all hazards by distance
  add <date> <lat> <lon> <text...>  register a hazard
  quit";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FeedFailure {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl From<FeedFailure> for LocationError {
    fn from(f: FeedFailure) -> Self {
        match f {
            FeedFailure::PermissionDenied => Self::PermissionDenied,
            FeedFailure::PositionUnavailable => Self::PositionUnavailable,
            FeedFailure::Timeout => Self::Timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedLine {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy: Option<f64>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Failure {
        error: FeedFailure,
    },
}

fn parse_feed(line: &str, now_ms: i64) -> Result<FeedItem, CommandError> {
    Ok(match serde_json::from_str(line)? {
        FeedLine::Fix {
            latitude,
            longitude,
            accuracy,
            timestamp,
        } => Ok(PositionFix {
            coordinate: Coordinate::new(latitude, longitude),
            accuracy_meters: accuracy,
            captured_at_ms: timestamp.unwrap_or(now_ms),
        }),
        FeedLine::Failure { error } => Err(error.into()),
    })
}

impl Command {
    /// Parse one input line. `now_ms` stamps fixes that carry no timestamp.
    pub fn parse(line: &str, now_ms: i64) -> Result<Self, CommandError> {
        let line = line.trim();

        if line.starts_with('{') {
            return parse_feed(line, now_ms).map(Self::Feed);
        }

        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(Self::Status);
        };

        match name {
            "play" => Ok(Self::Play),
            "refresh" => Ok(Self::Refresh),
            "status" => Ok(Self::Status),
            "list" => Ok(Self::List),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "voice" => match words.next() {
                Some("on") => Ok(Self::Voice(VoiceSwitch::On)),
                Some("off") => Ok(Self::Voice(VoiceSwitch::Off)),
                None | Some("toggle") => Ok(Self::Voice(VoiceSwitch::Toggle)),
                Some(_) => Err(CommandError::Usage("voice on|off|toggle")),
            },
            "threshold" => words
                .next()
                .and_then(|m| m.trim_end_matches('m').parse().ok())
                .map(Self::Threshold)
                .ok_or(CommandError::Usage("threshold 50|100|200")),
            "add" => {
                const USAGE: &str = "add <date> <lat> <lon> <description...>";

                let occurred_at = words.next().ok_or(CommandError::Usage(USAGE))?.to_owned();
                let lat = words.next().and_then(|w| w.parse().ok());
                let lon = words.next().and_then(|w| w.parse().ok());
                let (Some(lat), Some(lon)) = (lat, lon) else {
                    return Err(CommandError::Usage(USAGE));
                };

                Ok(Self::Add {
                    occurred_at,
                    coordinate: Coordinate::new(lat, lon),
                    description: words.collect::<Vec<_>>().join(" "),
                })
            }
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, 0)
    }
}
