//! mpv IPC driver with separated reader/writer tasks.
//!
//! ```text
//!   MpvDriver::spawn_and_connect()
//!         │
//!         ├── writer_task   ← receives PendingRequest via mpsc, writes JSON lines
//!         └── reader_task   ← reads JSON lines from the socket
//!                                ├── response (has request_id) → matching oneshot
//!                                └── event / property-change   → event_tx channel
//! ```
//!
//! mpv is started idle and paused with `--keep-open`, so reaching the end of
//! the track leaves the file loaded and flips `eof-reached` instead of
//! unloading it. Seeking back to the start and unpausing replays it.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use radio_core::mood::{MoodSetting, HIGH_SHELF_HZ, LOW_SHELF_HZ};
use radio_core::protocol::SILENT_DB;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// observe_property id for `eof-reached`.
pub const OBS_EOF: u64 = 1;

const REQUEST_TIMEOUT_SECS: u64 = 5;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// The event name, e.g. "file-loaded", "end-file".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

/// mpv's software volume is cubic: output gain = (volume / 100)³.
pub fn db_to_mpv_volume(db: f64) -> f64 {
    if db <= SILENT_DB {
        return 0.0;
    }
    let gain = 10f64.powf(db / 20.0);
    (100.0 * gain.cbrt()).clamp(0.0, 100.0)
}

/// lavfi graph for the two shelf filters of a mood.
pub fn tone_filter_graph(mood: &MoodSetting) -> String {
    format!(
        "bass=g={}:f={},treble=g={}:f={}",
        mood.low_gain_db, LOW_SHELF_HZ, mood.high_gain_db, HIGH_SHELF_HZ
    )
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            reply_rx,
        )
        .await
        .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
        .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn load_file(&self, path: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", path);
        self.send(json!(["loadfile", path])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn seek_to(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs.max(0.0), "absolute+exact"]))
            .await?;
        Ok(())
    }

    pub async fn set_volume(&self, percent: f64) -> anyhow::Result<()> {
        self.send(json!(["set_property", "volume", percent.clamp(0.0, 100.0)]))
            .await?;
        Ok(())
    }

    pub async fn get_time_pos(&self) -> anyhow::Result<f64> {
        let resp = self.send(json!(["get_property", "time-pos"])).await?;
        resp["data"]
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("time-pos unavailable"))
    }

    /// Playback rate plus the low/high shelf filters.
    pub async fn apply_mood(&self, mood: &MoodSetting) -> anyhow::Result<()> {
        self.send(json!(["set_property", "speed", mood.rate])).await?;
        let filter = json!([{
            "name": "lavfi",
            "label": "tone",
            "params": { "graph": tone_filter_graph(mood) }
        }]);
        self.send(json!(["set_property", "af", filter])).await?;
        Ok(())
    }

    /// Must be called after every fresh connection.
    pub async fn observe_all_properties(&self) {
        let props = [(OBS_EOF, "eof-reached")];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

/// Launch flags: idle and paused with the file kept open at EOF. Rate
/// changes resample, so pitch moves with the mood.
pub fn launch_args(ipc_arg: String) -> Vec<String> {
    [
        "--no-video",
        "--idle=yes",
        "--keep-open=yes",
        "--pause=yes",
        "--audio-pitch-correction=no",
        "--volume=0",
        "--quiet",
    ]
    .iter()
    .map(|a| a.to_string())
    .chain(std::iter::once(ipc_arg))
    .collect()
}

const CONNECT_ATTEMPTS: usize = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    child: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: radio_core::platform::mpv_socket_name(),
            child: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv liveness check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        #[cfg(unix)]
        {
            let _ = tokio::fs::remove_file(&self.socket_name).await;
        }
    }

    fn launch(&mut self) -> anyhow::Result<()> {
        let binary = radio_core::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let stderr_path = radio_core::platform::data_dir().join("mpv-stderr.log");
        let stderr = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = tokio::process::Command::new(&binary)
            .args(launch_args(radio_core::platform::mpv_socket_arg()))
            .stdout(std::process::Stdio::null())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "mpv: launched {} (pid {:?}), stderr → {}",
            binary.display(),
            child.id(),
            stderr_path.display()
        );
        self.child = Some(child);
        Ok(())
    }

    /// Start a fresh mpv and wire up the IPC tasks.
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.launch()?;

        for _ in 0..CONNECT_ATTEMPTS {
            tokio::time::sleep(CONNECT_BACKOFF).await;
            if let Some(handle) = self.try_connect(&event_tx).await {
                return Ok(handle);
            }
            if !self.process_alive() {
                anyhow::bail!("mpv exited during start-up");
            }
        }
        anyhow::bail!("mpv IPC endpoint {} never appeared", self.socket_name)
    }

    #[cfg(unix)]
    async fn try_connect(&self, event_tx: &mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let stream = UnixStream::connect(&self.socket_name).await.ok()?;
        info!("mpv: connected to {}", self.socket_name);
        let (read_half, write_half) = stream.into_split();
        Some(start_io_tasks(read_half, write_half, event_tx.clone()))
    }

    #[cfg(windows)]
    async fn try_connect(&self, event_tx: &mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let pipe = format!(r"\\.\pipe\{}", self.socket_name);
        let client = ClientOptions::new().open(&pipe).ok()?;
        info!("mpv: connected to {}", pipe);
        let (read_half, write_half) = tokio::io::split(client);
        Some(start_io_tasks(read_half, write_half, event_tx.clone()))
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel; the writer registers, the reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(read_half, pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

/// One line from the IPC stream.
#[derive(Debug)]
enum Incoming {
    Reply(u64, anyhow::Result<Value>),
    Event(MpvEvent),
    Junk,
}

fn classify(line: &str) -> Incoming {
    let line = line.trim();
    if line.is_empty() {
        return Incoming::Junk;
    }
    let Ok(val) = serde_json::from_str::<Value>(line) else {
        debug!("mpv reader: not json: {}", line);
        return Incoming::Junk;
    };
    match val.get("request_id").and_then(Value::as_u64) {
        Some(id) => {
            let result = match val.get("error").and_then(Value::as_str) {
                Some("success") => Ok(val),
                other => Err(anyhow::anyhow!(
                    "mpv error: {}",
                    other.unwrap_or("unknown error")
                )),
            };
            Incoming::Reply(id, result)
        }
        None => Incoming::Event(MpvEvent { raw: val }),
    }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(read_half: R, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(read_half).lines();
    let reason = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break "mpv IPC connection closed",
            Err(e) => {
                warn!("mpv reader: {}", e);
                break "mpv IPC read error";
            }
        };
        match classify(&line) {
            Incoming::Reply(id, result) => {
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(result);
                }
            }
            Incoming::Event(evt) => {
                if event_tx.send(evt).await.is_err() {
                    break "event receiver dropped";
                }
            }
            Incoming::Junk => {}
        }
    };
    debug!("mpv reader: {}", reason);
    fail_pending(&pending, reason).await;
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Registered first so a fast reply always finds its slot.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} {}", req.req_id, req.payload.trim_end());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: {}", e);
            fail_pending(&pending, "mpv IPC write error").await;
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_core::mood::mood_for_hour;

    #[test]
    fn volume_curve() {
        assert_eq!(db_to_mpv_volume(SILENT_DB), 0.0);
        assert!((db_to_mpv_volume(0.0) - 100.0).abs() < 1e-9);
        // 50% linear gain → cube root ≈ 79.37%
        let half = radio_core::playback::gain_to_db(0.5);
        assert!((db_to_mpv_volume(half) - 79.370).abs() < 1e-2);
    }

    #[test]
    fn tone_graph_for_sunset() {
        let graph = tone_filter_graph(&mood_for_hour(19));
        assert_eq!(graph, "bass=g=5:f=200,treble=g=-2:f=3000");
    }

    #[test]
    fn property_change_parsing() {
        let evt = MpvEvent {
            raw: json!({"event": "property-change", "id": 1, "name": "eof-reached", "data": true}),
        };
        let (id, data) = evt.as_property_change().unwrap();
        assert_eq!(id, OBS_EOF);
        assert_eq!(data.as_bool(), Some(true));

        let loaded = MpvEvent {
            raw: json!({"event": "file-loaded"}),
        };
        assert!(loaded.as_property_change().is_none());
        assert_eq!(loaded.event_name(), Some("file-loaded"));
    }

    #[test]
    fn launch_args_keep_file_open_and_paused() {
        let args = launch_args("--input-ipc-server=/tmp/x.sock".to_string());
        assert!(args.contains(&"--keep-open=yes".to_string()));
        assert!(args.contains(&"--pause=yes".to_string()));
        assert!(args.contains(&"--audio-pitch-correction=no".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--input-ipc-server=/tmp/x.sock"));
    }

    #[test]
    fn classify_lines() {
        assert!(matches!(classify("   "), Incoming::Junk));
        assert!(matches!(classify("not json"), Incoming::Junk));
        assert!(matches!(
            classify(r#"{"request_id":7,"error":"success","data":1}"#),
            Incoming::Reply(7, Ok(_))
        ));
        assert!(matches!(
            classify(r#"{"request_id":8,"error":"property unavailable"}"#),
            Incoming::Reply(8, Err(_))
        ));
        assert!(matches!(classify(r#"{"event":"file-loaded"}"#), Incoming::Event(_)));
    }

    #[tokio::test]
    async fn request_reply_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_r, client_w) = tokio::io::split(client);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client_r, client_w, event_tx);

        let fake_mpv = tokio::spawn(async move {
            let (server_r, mut server_w) = tokio::io::split(server);
            let mut lines = BufReader::new(server_r).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            let id = req["request_id"].as_u64().unwrap();
            assert_eq!(req["command"], json!(["get_property", "time-pos"]));
            let event = "{\"event\":\"property-change\",\"id\":1,\"data\":true}\n";
            server_w.write_all(event.as_bytes()).await.unwrap();
            let reply = format!("{{\"data\":42.0,\"error\":\"success\",\"request_id\":{id}}}\n");
            server_w.write_all(reply.as_bytes()).await.unwrap();
        });

        assert_eq!(handle.get_time_pos().await.unwrap(), 42.0);
        let evt = event_rx.recv().await.unwrap();
        assert_eq!(evt.as_property_change().map(|(id, _)| id), Some(OBS_EOF));
        fake_mpv.await.unwrap();
    }
}
