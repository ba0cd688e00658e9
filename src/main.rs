mod analysis;
mod app;
mod config;
mod error;
mod fallback;
mod lyrics;
mod player;
mod storage;
mod sync;

use analysis::AudioSignal;
use anyhow::Context;
use app::events::{Event, LyricsEvent, PlayerEvent};
use app::{Resolution, Session};
use clap::{Parser, Subcommand};
use lyrics::title::{self, TitleArtist};
use lyrics::LyricRecord;
use player::WallClock;
use player::mpv::MpvHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Plain lines shown when a record has no timing.
const PREVIEW_LINES: usize = 3;

#[derive(Debug, Parser)]
#[command(name = "verse", version, about = "Synced lyrics with a deterministic fallback")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split a free-form label into artist and title.
    Parse { label: String },
    /// Look up lyrics and print the plain text.
    Search { title: String, artist: String },
    /// Parse a local LRC file and print its timed lines.
    Lrc { file: PathBuf },
    /// Print line changes as if the track started playing now.
    Follow {
        title: String,
        artist: String,
        /// Start this many seconds into the track.
        #[arg(long, default_value_t = 0.0)]
        offset: f64,
    },
    /// Play a local file through mpv with synced lyrics.
    Play {
        file: PathBuf,
        /// "Artist - Title" style label; defaults to the file name.
        #[arg(long)]
        label: Option<String>,
    },
    /// Run the fallback chain over one audio segment.
    Transcribe {
        file: PathBuf,
        /// Also ask the generator for a mood palette.
        #[arg(long)]
        mood: bool,
    },
    /// Print the signal profile of an audio segment.
    Analyze { file: PathBuf },
    /// List stored fallback results.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("verse=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let (tx, mut rx) = mpsc::channel::<Event>(256);

    match cli.command {
        Command::Parse { label } => match title::parse(&label) {
            Some(t) => {
                println!("artist: {}", t.artist);
                println!("title:  {}", t.title);
            }
            None => println!("no match"),
        },
        Command::Search { title, artist } => {
            let session = Session::from_config(&cfg, tx)?;
            match session.lookup(&title, &artist).await {
                Some(record) => {
                    for line in &record.plain_text {
                        println!("{line}");
                    }
                }
                None => println!("not found"),
            }
        }
        Command::Lrc { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let record = LyricRecord::from_lrc(raw);
            for line in record.timed_lines() {
                println!("[{:>8.2}] {}", line.offset_seconds, line.text);
            }
        }
        Command::Follow {
            title,
            artist,
            offset,
        } => {
            let mut session = Session::from_config(&cfg, tx)?;
            let Some(record) = session.lookup(&title, &artist).await else {
                println!("not found");
                return Ok(());
            };
            if !session.follow(&record, Arc::new(WallClock::starting_at(offset))) {
                print_preview(&record);
                return Ok(());
            }

            let remaining = record
                .duration_secs
                .map(|d| Duration::from_secs_f64((d - offset).max(0.0)))
                .unwrap_or(Duration::MAX);
            let end = tokio::time::sleep(remaining);
            tokio::pin!(end);
            loop {
                tokio::select! {
                    Some(ev) = rx.recv() => print_event(&ev),
                    _ = &mut end => break,
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            session.stop_following();
        }
        Command::Play { file, label } => {
            play(&cfg, &file, label.as_deref(), tx, &mut rx).await?;
        }
        Command::Transcribe { file, mood } => {
            let session = Session::from_config(&cfg, tx)?;
            let signal = AudioSignal::read(&file).await?;
            let transcript = session.transcribe(&signal).await;
            println!("{}", transcript.tagged);
            if mood {
                let mood = session.mood(&transcript.tagged.text).await;
                println!("{}", serde_json::to_string_pretty(&mood)?);
            }
        }
        Command::Analyze { file } => {
            let session = Session::from_config(&cfg, tx)?;
            let signal = AudioSignal::read(&file).await?;
            let p = session.chain().analyze(&signal).await.profile;
            println!("hash:             {}", p.derived_hash);
            println!("intensity:        {:.2}", p.intensity);
            println!("rhythm class:     {}", p.rhythm_class);
            println!("tone class:       {}", p.tone_class);
            println!("vocal confidence: {:.2}", p.vocal_confidence);
        }
        Command::History { limit } => {
            let session = Session::from_config(&cfg, tx)?;
            let Some(history) = session.history() else {
                return Ok(());
            };
            for row in history.recent_transcripts(limit).await? {
                println!(
                    "{}  [{}] {}  (hash={})",
                    row.created_at, row.stage, row.text, row.signal_hash
                );
            }
        }
    }

    Ok(())
}

async fn play(
    cfg: &config::Config,
    file: &Path,
    label: Option<&str>,
    tx: mpsc::Sender<Event>,
    rx: &mut mpsc::Receiver<Event>,
) -> anyhow::Result<()> {
    let mut session = Session::from_config(cfg, tx.clone())?;
    let mpv_log = cfg.paths.data_dir.join("mpv.log");
    let mpv = MpvHandle::spawn(tx, cfg.player.audio_device.as_deref(), Some(&mpv_log))
        .await
        .context("start mpv")?;
    mpv.set_volume(cfg.player.volume).await?;
    mpv.load_file(file).await?;

    let track = label
        .map(str::to_string)
        .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .as_deref()
        .and_then(title::parse);
    match &track {
        Some(TitleArtist { artist, title }) => println!("{title} by {artist}"),
        None => debug!("No title/artist in label, skipping lyric lookup"),
    }

    let signal = AudioSignal::read(file).await?;
    match session.resolve(track.as_ref(), &signal).await {
        Resolution::Lyrics(record) => {
            if !session.follow(&record, mpv.playback()) {
                print_preview(&record);
            }
        }
        Resolution::Transcribed(transcript) => println!("{}", transcript.tagged),
    }

    loop {
        tokio::select! {
            Some(ev) = rx.recv() => {
                let ended = matches!(ev, Event::Player(PlayerEvent::Ended));
                print_event(&ev);
                if ended {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    session.stop_following();
    Ok(())
}

fn print_preview(record: &LyricRecord) {
    for line in record.preview(PREVIEW_LINES) {
        println!("{line}");
    }
}

fn print_event(ev: &Event) {
    match ev {
        Event::Lyrics(LyricsEvent::LineChanged { text }) => println!("{text}"),
        // Printed by the caller from the returned transcript.
        Event::Transcription(tagged) => debug!("transcription event: {tagged}"),
        Event::Player(PlayerEvent::Error(e)) => warn!("{e}"),
        Event::Player(PlayerEvent::Duration { seconds }) => {
            debug!("track duration {seconds:.1}s");
        }
        Event::Player(pe) => debug!("player: {pe:?}"),
    }
}
