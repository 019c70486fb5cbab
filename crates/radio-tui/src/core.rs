/// PlayerCore: single-owner event loop for the audio side.
///
/// Owns `MpvDriver`, the live `MpvHandle`, the volume ramp task and the
/// analyser tap. The app sends `CoreEvent::Command` values produced by the
/// playback controller; mpv pushes property changes back in through the same
/// channel. Everything the app needs to know goes out as `PlayerEvent`.
///
/// The track is loaded once and left paused. `Start` seeks and unpauses,
/// `Halt` pauses. A `Start` that arrives before `file-loaded` is held until
/// the file is ready.
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use radio_core::config::MeterConfig;
use radio_core::mood::MoodSetting;
use radio_core::protocol::{PlayerCommand, PlayerHealth};

use crate::analyser::{self, TapRequest};
use crate::mpv::{db_to_mpv_volume, MpvDriver, MpvEvent, MpvHandle, OBS_EOF};

const RAMP_STEP: Duration = Duration::from_millis(10);
const HEARTBEAT: Duration = Duration::from_secs(5);

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    Command(PlayerCommand),
    /// Raw mpv unsolicited event (forwarded from the reader task).
    Mpv(MpvEvent),
    /// Check process liveness.
    HeartbeatTick,
    Shutdown,
}

/// Everything PlayerCore reports back to the app.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Health(PlayerHealth),
    /// mpv reached the end of the track while playing.
    TrackEnded,
    /// Analyser output for the level meter.
    Frame(Arc<Vec<f32>>),
    /// The tap stopped; the meter should fall to zero.
    FrameCleared,
    Log(String),
}

pub struct PlayerCore {
    track: PathBuf,
    meter: MeterConfig,
    mpv_driver: MpvDriver,
    /// `None` until mpv is connected.
    mpv_handle: Option<MpvHandle>,
    /// Our own sender, handed to the mpv event forwarder and heartbeat.
    self_tx: mpsc::Sender<CoreEvent>,
    out_tx: mpsc::Sender<PlayerEvent>,
    health: PlayerHealth,
    loaded: bool,
    pending_start: Option<f64>,
    playing: bool,
    mood: Option<MoodSetting>,
    /// Last volume written to mpv, as f64 bits; shared with the ramp task.
    volume: Arc<AtomicU64>,
    target_volume: f64,
    ramp_task: Option<tokio::task::AbortHandle>,
    tap_task: Option<tokio::task::AbortHandle>,
}

impl PlayerCore {
    pub fn new(
        track: PathBuf,
        meter: MeterConfig,
        self_tx: mpsc::Sender<CoreEvent>,
        out_tx: mpsc::Sender<PlayerEvent>,
    ) -> Self {
        Self {
            track,
            meter,
            mpv_driver: MpvDriver::new(),
            mpv_handle: None,
            self_tx,
            out_tx,
            health: PlayerHealth::Absent,
            loaded: false,
            pending_start: None,
            playing: false,
            mood: None,
            volume: Arc::new(AtomicU64::new(0f64.to_bits())),
            target_volume: 0.0,
            ramp_task: None,
            tap_task: None,
        }
    }

    /// Run until `Shutdown` or the channel closes (app exited).
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");

        let heartbeat_tx = self.self_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEARTBEAT).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        self.connect().await;

        while let Some(evt) = event_rx.recv().await {
            match evt {
                CoreEvent::Shutdown => {
                    info!("PlayerCore: shutdown requested");
                    break;
                }
                CoreEvent::Command(cmd) => {
                    debug!("PlayerCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd).await {
                        error!("PlayerCore: command error: {}", e);
                    }
                }
                CoreEvent::Mpv(evt) => self.handle_mpv_event(evt).await,
                CoreEvent::HeartbeatTick => {
                    if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
                        warn!("PlayerCore: heartbeat: mpv process died");
                        self.mpv_handle = None;
                        self.loaded = false;
                        self.playing = false;
                        self.stop_tap().await;
                        self.set_health(PlayerHealth::Dead("mpv exited".to_string()))
                            .await;
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    async fn set_health(&mut self, health: PlayerHealth) {
        if self.health != health {
            info!("PlayerCore: health {:?} → {:?}", self.health, health);
            self.health = health.clone();
            let _ = self.out_tx.send(PlayerEvent::Health(health)).await;
        }
    }

    async fn log(&self, msg: impl Into<String>) {
        let _ = self.out_tx.send(PlayerEvent::Log(msg.into())).await;
    }

    /// Spawn mpv, observe properties and start loading the track.
    async fn connect(&mut self) {
        let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
        let core_tx = self.self_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = event_rx.recv().await {
                if core_tx.send(CoreEvent::Mpv(evt)).await.is_err() {
                    break;
                }
            }
        });

        self.set_health(PlayerHealth::Starting).await;
        let handle = match self.mpv_driver.spawn_and_connect(event_tx).await {
            Ok(h) => h,
            Err(e) => {
                warn!("PlayerCore: failed to start mpv: {}", e);
                self.set_health(PlayerHealth::Dead(e.to_string())).await;
                return;
            }
        };
        handle.observe_all_properties().await;

        self.set_health(PlayerHealth::Loading).await;
        let path = self.track.to_string_lossy().into_owned();
        if let Err(e) = handle.load_file(&path).await {
            warn!("PlayerCore: loadfile '{}' failed: {}", path, e);
            self.set_health(PlayerHealth::Dead(format!("cannot load {}", path)))
                .await;
        }
        self.mpv_handle = Some(handle);
    }

    async fn handle_command(&mut self, cmd: PlayerCommand) -> anyhow::Result<()> {
        match cmd {
            PlayerCommand::Start { offset_secs } => {
                if !self.loaded {
                    debug!("PlayerCore: start at {:.2}s deferred until loaded", offset_secs);
                    self.pending_start = Some(offset_secs);
                    return Ok(());
                }
                self.start(offset_secs).await?;
            }
            PlayerCommand::Halt => {
                self.pending_start = None;
                self.playing = false;
                self.stop_tap().await;
                if let Some(handle) = self.mpv_handle.as_ref() {
                    let _ = handle.set_pause(true).await;
                }
            }
            PlayerCommand::SetGain { db, ramp_secs } => {
                self.ramp_to(db_to_mpv_volume(db), ramp_secs);
            }
            PlayerCommand::ApplyMood(mood) => {
                self.mood = Some(mood);
                if let Some(handle) = self.mpv_handle.clone() {
                    handle.apply_mood(&mood).await?;
                    if self.playing {
                        // Re-pace the tap at the new rate from where mpv is now.
                        let pos = handle.get_time_pos().await.unwrap_or(0.0);
                        self.start_tap(pos).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn start(&mut self, offset_secs: f64) -> anyhow::Result<()> {
        let Some(handle) = self.mpv_handle.clone() else {
            return Ok(());
        };
        handle.seek_to(offset_secs).await?;
        handle.set_pause(false).await?;
        self.playing = true;
        self.start_tap(offset_secs).await;
        Ok(())
    }

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if let Some((obs_id, data)) = evt.as_property_change() {
            if obs_id == OBS_EOF && data.as_bool() == Some(true) && self.playing {
                info!("PlayerCore: end of track");
                self.playing = false;
                self.stop_tap().await;
                let _ = self.out_tx.send(PlayerEvent::TrackEnded).await;
            }
            return;
        }

        match evt.event_name() {
            Some("file-loaded") => {
                info!("PlayerCore: track loaded");
                self.loaded = true;
                self.set_health(PlayerHealth::Ready).await;
                if let Some(handle) = self.mpv_handle.clone() {
                    if let Some(mood) = self.mood {
                        if let Err(e) = handle.apply_mood(&mood).await {
                            warn!("PlayerCore: apply mood failed: {}", e);
                        }
                    }
                    if handle.set_volume(self.target_volume).await.is_ok() {
                        self.volume
                            .store(self.target_volume.to_bits(), Ordering::Relaxed);
                    }
                }
                if let Some(offset) = self.pending_start.take() {
                    if let Err(e) = self.start(offset).await {
                        warn!("PlayerCore: deferred start failed: {}", e);
                    }
                }
            }
            Some("end-file") => {
                if evt.raw.get("reason").and_then(|r| r.as_str()) == Some("error") {
                    let reason = evt
                        .raw
                        .get("file_error")
                        .and_then(|r| r.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    warn!("PlayerCore: track failed to load: {}", reason);
                    self.loaded = false;
                    self.playing = false;
                    self.stop_tap().await;
                    self.log(format!("track failed: {}", reason)).await;
                    self.set_health(PlayerHealth::Dead(format!("track failed: {}", reason)))
                        .await;
                }
            }
            _ => {}
        }
    }

    /// Step mpv's volume toward `target` over `secs`. A new ramp cancels the
    /// one in flight and starts from wherever it got to.
    fn ramp_to(&mut self, target: f64, secs: f64) {
        if let Some(h) = self.ramp_task.take() {
            h.abort();
        }
        self.target_volume = target;
        let Some(handle) = self.mpv_handle.clone() else {
            return;
        };
        let current = Arc::clone(&self.volume);
        let task = tokio::spawn(async move {
            let from = f64::from_bits(current.load(Ordering::Relaxed));
            let steps = ramp_steps(secs);
            for i in 1..=steps {
                let v = from + (target - from) * i as f64 / steps as f64;
                if let Err(e) = handle.set_volume(v).await {
                    debug!("volume ramp aborted: {}", e);
                    break;
                }
                current.store(v.to_bits(), Ordering::Relaxed);
                if i < steps {
                    tokio::time::sleep(RAMP_STEP).await;
                }
            }
        });
        self.ramp_task = Some(task.abort_handle());
    }

    async fn start_tap(&mut self, offset_secs: f64) {
        self.stop_tap().await;
        let req = TapRequest {
            track: self.track.clone(),
            offset_secs,
            rate: self.mood.map(|m| m.rate).unwrap_or(1.0),
            source: self.meter.source,
            fft_size: self.meter.fft_size,
        };
        let tx = self.out_tx.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = analyser::run_tap(req, tx).await {
                debug!("analyser tap exited: {e}");
            }
        });
        self.tap_task = Some(task.abort_handle());
    }

    async fn stop_tap(&mut self) {
        if let Some(h) = self.tap_task.take() {
            h.abort();
            let _ = self.out_tx.send(PlayerEvent::FrameCleared).await;
        }
    }

    async fn cleanup(&mut self) {
        info!("PlayerCore: cleanup, killing mpv");
        if let Some(h) = self.ramp_task.take() {
            h.abort();
        }
        if let Some(h) = self.tap_task.take() {
            h.abort();
        }
        self.mpv_handle = None;
        self.mpv_driver.kill().await;
    }
}

fn ramp_steps(secs: f64) -> u32 {
    if !secs.is_finite() || secs <= 0.0 {
        return 1;
    }
    ((secs / RAMP_STEP.as_secs_f64()).ceil() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_core::mood::mood_for_hour;

    fn core() -> (PlayerCore, mpsc::Receiver<PlayerEvent>) {
        let (self_tx, _self_rx) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        let core = PlayerCore::new(
            PathBuf::from("audio/track.mp3"),
            MeterConfig::default(),
            self_tx,
            out_tx,
        );
        (core, out_rx)
    }

    #[test]
    fn ramp_step_count() {
        assert_eq!(ramp_steps(0.0), 1);
        assert_eq!(ramp_steps(0.02), 2);
        assert_eq!(ramp_steps(0.05), 5);
        assert_eq!(ramp_steps(f64::NAN), 1);
    }

    #[tokio::test]
    async fn start_before_load_is_deferred() {
        let (mut core, _rx) = core();
        core.handle_command(PlayerCommand::Start { offset_secs: 3.0 })
            .await
            .unwrap();
        assert_eq!(core.pending_start, Some(3.0));
        assert!(!core.playing);

        core.handle_command(PlayerCommand::Halt).await.unwrap();
        assert_eq!(core.pending_start, None);
    }

    #[tokio::test]
    async fn gain_and_mood_are_remembered_without_mpv() {
        let (mut core, _rx) = core();
        core.handle_command(PlayerCommand::SetGain {
            db: 0.0,
            ramp_secs: 0.02,
        })
        .await
        .unwrap();
        assert!((core.target_volume - 100.0).abs() < 1e-9);

        let mood = mood_for_hour(7);
        core.handle_command(PlayerCommand::ApplyMood(mood))
            .await
            .unwrap();
        assert_eq!(core.mood, Some(mood));
    }

    #[tokio::test]
    async fn eof_while_playing_reports_track_end() {
        let (mut core, mut rx) = core();
        core.playing = true;
        let evt = MpvEvent {
            raw: serde_json::json!({"event": "property-change", "id": OBS_EOF, "data": true}),
        };
        core.handle_mpv_event(evt).await;
        assert!(matches!(rx.recv().await, Some(PlayerEvent::TrackEnded)));
        assert!(!core.playing);
    }

    #[tokio::test]
    async fn eof_while_halted_is_ignored() {
        let (mut core, mut rx) = core();
        let evt = MpvEvent {
            raw: serde_json::json!({"event": "property-change", "id": OBS_EOF, "data": true}),
        };
        core.handle_mpv_event(evt).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn load_error_marks_player_dead() {
        let (mut core, mut rx) = core();
        let evt = MpvEvent {
            raw: serde_json::json!({"event": "end-file", "reason": "error", "file_error": "no such file"}),
        };
        core.handle_mpv_event(evt).await;
        assert!(matches!(rx.recv().await, Some(PlayerEvent::Log(_))));
        match rx.recv().await {
            Some(PlayerEvent::Health(PlayerHealth::Dead(msg))) => assert!(msg.contains("no such file")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
