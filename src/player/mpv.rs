//! Headless mpv controlled over its JSON IPC socket.
//!
//! Observed properties are turned into [`PlayerEvent`]s and mirrored into a
//! [`SharedPlayback`], which is what the lyric poller reads.

use crate::app::events::{Event, PlayerEvent};
use crate::player::{PositionProvider, SharedPlayback};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Properties observed at startup; the index doubles as the observer id.
const OBSERVED: [&str; 4] = ["time-pos", "duration", "pause", "eof-reached"];
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct IpcRequest<'a> {
    command: &'a [Value],
    request_id: u64,
}

/// Every field mpv may put on a line we care about. Replies carry
/// `request_id`/`error`, events carry `event` and friends.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpcMessage {
    request_id: Option<u64>,
    error: Option<String>,
    event: Option<String>,
    name: Option<String>,
    data: Value,
    reason: Option<String>,
    file_error: Option<String>,
    level: Option<String>,
    text: Option<String>,
}

#[derive(Debug)]
pub struct MpvHandle {
    child: Child,
    socket_path: PathBuf,
    writer: Mutex<WriteHalf<UnixStream>>,
    next_request: AtomicU64,
    playback: Arc<SharedPlayback>,
}

impl MpvHandle {
    pub async fn spawn(
        event_tx: mpsc::Sender<Event>,
        audio_device: Option<&str>,
        log_file: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let socket_path =
            std::env::temp_dir().join(format!("verse-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let mut args = vec![
            "--no-video".to_string(),
            "--idle=yes".to_string(),
            "--input-terminal=no".to_string(),
            // warnings arrive as log-message events instead
            "--really-quiet".to_string(),
            format!("--input-ipc-server={}", socket_path.display()),
        ];
        args.extend(audio_device.map(|d| format!("--audio-device={d}")));
        args.extend(log_file.map(|p| format!("--log-file={}", p.display())));

        let child = Command::new("mpv")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawn mpv")?;

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, wait_for_socket(&socket_path))
            .await
            .with_context(|| format!("mpv ipc socket {} never appeared", socket_path.display()))?;
        let (reader, writer) = tokio::io::split(stream);

        let playback = Arc::new(SharedPlayback::new());
        tokio::spawn(pump_events(reader, event_tx, Arc::clone(&playback)));

        let handle = Self {
            child,
            socket_path,
            writer: Mutex::new(writer),
            next_request: AtomicU64::new(1),
            playback,
        };

        handle
            .send(&[Value::from("request_log_messages"), Value::from("warn")])
            .await?;
        for (id, property) in OBSERVED.iter().enumerate() {
            handle
                .send(&[
                    Value::from("observe_property"),
                    Value::from(id + 1),
                    Value::from(*property),
                ])
                .await?;
        }
        Ok(handle)
    }

    /// Shared view of the playback position, for handing to the sync dispatcher.
    pub fn playback(&self) -> Arc<SharedPlayback> {
        Arc::clone(&self.playback)
    }

    pub async fn load_file(&self, path: &Path) -> anyhow::Result<()> {
        let path = path.to_string_lossy();
        self.send(&[
            Value::from("loadfile"),
            Value::from(path.into_owned()),
            Value::from("replace"),
        ])
        .await
    }

    pub async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
        self.send(&[
            Value::from("set_property"),
            Value::from("volume"),
            Value::from(volume.min(100)),
        ])
        .await
    }

    async fn send(&self, command: &[Value]) -> anyhow::Result<()> {
        let request = IpcRequest {
            command,
            request_id: self.next_request.fetch_add(1, Ordering::Relaxed),
        };
        let mut line = serde_json::to_vec(&request).context("encode mpv request")?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.context("write mpv ipc")?;
        writer.flush().await.context("flush mpv ipc")?;
        Ok(())
    }
}

impl PositionProvider for MpvHandle {
    fn position_seconds(&self) -> f64 {
        self.playback.position_seconds()
    }

    fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }
}

impl Drop for MpvHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// mpv creates the socket a moment after it starts.
async fn wait_for_socket(path: &Path) -> UnixStream {
    loop {
        match UnixStream::connect(path).await {
            Ok(stream) => return stream,
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
}

async fn pump_events(
    reader: ReadHalf<UnixStream>,
    event_tx: mpsc::Sender<Event>,
    playback: Arc<SharedPlayback>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(msg) = serde_json::from_str::<IpcMessage>(&line) else {
            debug!("unparsed mpv line: {line}");
            continue;
        };
        let Some(event) = to_player_event(&msg) else {
            continue;
        };
        apply_to_playback(&playback, &event);
        // time-pos fires many times a second; pollers read it from `playback`.
        if matches!(event, PlayerEvent::Position { .. }) {
            continue;
        }
        if event_tx.send(Event::Player(event)).await.is_err() {
            break;
        }
    }
}

fn apply_to_playback(playback: &SharedPlayback, event: &PlayerEvent) {
    match event {
        PlayerEvent::Position { seconds } => playback.set_position(*seconds),
        PlayerEvent::Started => playback.set_playing(true),
        PlayerEvent::Paused | PlayerEvent::Ended => playback.set_playing(false),
        PlayerEvent::Duration { .. } | PlayerEvent::Error(_) => {}
    }
}

fn to_player_event(msg: &IpcMessage) -> Option<PlayerEvent> {
    if msg.request_id.is_some() {
        return match msg.error.as_deref() {
            Some(err) if err != "success" => {
                Some(PlayerEvent::Error(format!("mpv rejected a command: {err}")))
            }
            _ => None,
        };
    }

    match msg.event.as_deref()? {
        "property-change" => property_event(msg.name.as_deref()?, &msg.data),
        "end-file" if msg.reason.as_deref() == Some("error") => Some(PlayerEvent::Error(format!(
            "mpv could not play the file: {}",
            msg.file_error
                .as_deref()
                .or(msg.error.as_deref())
                .unwrap_or("unknown error")
        ))),
        "end-file" => Some(PlayerEvent::Ended),
        "log-message" => {
            let level = msg.level.as_deref().unwrap_or("info");
            let text = msg.text.as_deref().unwrap_or("").trim();
            (matches!(level, "warn" | "error") && !text.is_empty())
                .then(|| PlayerEvent::Error(format!("mpv {level}: {text}")))
        }
        _ => None,
    }
}

fn property_event(name: &str, data: &Value) -> Option<PlayerEvent> {
    match name {
        // null while nothing is loaded
        "time-pos" => data.as_f64().map(|seconds| PlayerEvent::Position { seconds }),
        "duration" => data.as_f64().map(|seconds| PlayerEvent::Duration { seconds }),
        "pause" => Some(if data.as_bool()? {
            PlayerEvent::Paused
        } else {
            PlayerEvent::Started
        }),
        "eof-reached" => data.as_bool()?.then_some(PlayerEvent::Ended),
        _ => None,
    }
}
