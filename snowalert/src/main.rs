use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use hazardalert::{
    message::{format_list_distance, STALE_HINT},
    proximity::rank_all,
    registration::RegistrationForm,
    source::{Clock, LocationPolicy, SystemClock},
    speech::{select_voice, Voice},
    store::{load_hazards, JsonFileStore},
    tracker::TrackerState,
    AlertSession, PositionTracker, SettingsHandle,
};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    adapters::{FeedSource, TerminalBell, TerminalSpeech},
    command::{Command, VoiceSwitch, HELP},
};

mod adapters;
mod command;

/// Spoken alerts for recorded road hazards near the current position.
#[derive(Debug, StructOpt)]
#[structopt(name = "snowalert")]
struct Opt {
    /// JSON file holding the hazard list.
    #[structopt(
        long,
        env = "SNOWALERT_HAZARDS",
        default_value = "data/accidents.json",
        parse(from_os_str)
    )]
    hazards: PathBuf,
    /// Alert radius in meters: 50, 100 or 200.
    #[structopt(long, env = "SNOWALERT_THRESHOLD", default_value = "100")]
    threshold: u32,
    /// Start with voice alerts disabled.
    #[structopt(long)]
    no_voice: bool,
    /// Seconds after which the position counts as stale.
    #[structopt(long, env = "SNOWALERT_STALE_SECS", default_value = "30")]
    stale_secs: u64,
    /// Prefix for ids of registered hazards.
    #[structopt(long, env = "SNOWALERT_ID_PREFIX", default_value = "acc")]
    id_prefix: String,
    /// Available voices, as `name=lang`.
    #[structopt(long, env = "SNOWALERT_VOICES", use_delimiter = true)]
    voices: Vec<Voice>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::from_args();

    let settings = SettingsHandle::default();
    if !settings.set_threshold_meters(opt.threshold) {
        warn!(
            requested = opt.threshold,
            kept = %settings.threshold(),
            "unsupported threshold"
        );
    }
    settings.set_voice_enabled(!opt.no_voice);

    let clock = Arc::new(SystemClock);
    let store = JsonFileStore::new(&opt.hazards);
    let feed = Arc::new(FeedSource::new(LocationPolicy::DEFAULT));
    let tracker = Arc::new(PositionTracker::new(feed.clone(), clock.clone()));

    let voice = select_voice(&opt.voices).cloned();
    if let Some(voice) = &voice {
        info!(name = %voice.name, "voice selected");
    }

    let mut session = AlertSession::new(
        settings.clone(),
        Arc::new(TerminalSpeech::new(voice)),
        Arc::new(TerminalBell::default()),
    );
    session.set_hazards(load_hazards(&store).await);
    info!(
        hazards = session.hazards().len(),
        path = %store.path().display(),
        threshold = %settings.threshold(),
        "hazards loaded"
    );

    let mut states = tracker.subscribe();
    tracker.start_watch();
    spawn_refresh(&tracker);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut screen = Screen::default();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                session.apply_tracker_state(&state);
                screen.render(&session, &state);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };

                let command = match Command::parse(&line, clock.now_ms()) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };

                match command {
                    Command::Feed(item) => feed.push(item),
                    Command::Play => {
                        if !session.trigger_voice_alert() {
                            println!("nothing to play (voice {})", on_off(settings.voice_enabled()));
                        }
                    }
                    Command::Refresh => spawn_refresh(&tracker),
                    Command::Voice(switch) => {
                        match switch {
                            VoiceSwitch::On => settings.set_voice_enabled(true),
                            VoiceSwitch::Off => settings.set_voice_enabled(false),
                            VoiceSwitch::Toggle => {
                                settings.toggle_voice();
                            }
                        }
                        println!("voice {}", on_off(settings.voice_enabled()));
                    }
                    Command::Threshold(meters) => {
                        if settings.set_threshold_meters(meters) {
                            screen.force_render(&session, &tracker.snapshot());
                        } else {
                            println!("threshold stays {} (choose 50, 100 or 200)", settings.threshold());
                        }
                    }
                    Command::Status => screen.force_render(&session, &tracker.snapshot()),
                    Command::List => print_list(&session),
                    Command::Add { occurred_at, coordinate, description } => {
                        let form = RegistrationForm {
                            occurred_at,
                            description,
                            coordinate: Some(coordinate),
                            ..RegistrationForm::default()
                        };

                        match form.submit(&store, &opt.id_prefix).await {
                            Ok(hazard) => {
                                println!("registered {}", hazard.id);
                                session.set_hazards(load_hazards(&store).await);
                                screen.render(&session, &tracker.snapshot());
                            }
                            Err(e) => {
                                warn!(error = %e, "registration failed");
                                println!("{}", e.user_message());
                            }
                        }
                    }
                    Command::Help => println!("{HELP}"),
                    Command::Quit => break,
                }
            }
            _ = ticker.tick() => {
                // display only, the ranking is left alone
                let stale = tracker.is_stale(clock.now_ms(), opt.stale_secs);
                if stale && !screen.stale_shown {
                    println!("{STALE_HINT}");
                }
                screen.stale_shown = stale;
            }
        }
    }

    tracker.stop_watch();
    Ok(())
}

fn spawn_refresh(tracker: &Arc<PositionTracker>) {
    let tracker = Arc::clone(tracker);
    tokio::spawn(async move { tracker.request_once().await });
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

fn print_list(session: &AlertSession) {
    if session.hazards().is_empty() {
        println!("登録されている事故はありません。");
        return;
    }

    let rows: Vec<_> = match session.position() {
        Some(fix) => {
            println!("現在地から近い順に表示しています");
            rank_all(session.hazards(), &fix.coordinate)
                .into_iter()
                .map(|r| (format_list_distance(Some(r.distance_meters)), r.hazard))
                .collect()
        }
        None => {
            println!("位置情報を許可すると、距離順で表示されます");
            session
                .hazards()
                .iter()
                .map(|h| (format_list_distance(None), h.clone()))
                .collect()
        }
    };

    for (distance, hazard) in rows {
        println!(
            "{distance:>8}  {}  {}  {}",
            hazard.category, hazard.occurred_at, hazard.description
        );
    }
}

/// What has been printed, so unchanged status lines are not repeated.
#[derive(Debug, Default)]
struct Screen {
    last: Option<String>,
    stale_shown: bool,
}

impl Screen {
    fn compose(session: &AlertSession, state: &TrackerState) -> String {
        if let Some(e) = state.last_error {
            return format!("{} (`refresh` で再試行)", e.user_message());
        }
        if state.fix.is_none() {
            return "位置情報を取得しています…".to_owned();
        }

        match session.banner() {
            Some(banner) => format!("⚠ {banner}\n{}", session.status()),
            None => session.status(),
        }
    }

    fn render(&mut self, session: &AlertSession, state: &TrackerState) {
        let text = Self::compose(session, state);

        if self.last.as_ref() != Some(&text) {
            println!("{text}");
            self.last = Some(text);
        }
    }

    fn force_render(&mut self, session: &AlertSession, state: &TrackerState) {
        self.last = None;
        self.render(session, state);
    }
}
