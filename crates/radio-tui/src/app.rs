//! App: the terminal event loop.
//!
//! - `App` owns the playback controller, level meter and marquee.
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background
//!   tasks (terminal reader, PlayerCore forwarder).
//! - Every frame tick samples the meter, re-applies the mood and redraws;
//!   key presses and clicks that act redraw at once.
//! - Player commands flow out to PlayerCore through `core_tx`.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use radio_core::config::Config;
use radio_core::input::Intent;
use radio_core::level_meter::LevelMeter;
use radio_core::marquee::Marquee;
use radio_core::mood::current_mood;
use radio_core::panel::{render, PanelView, TRACK_WIDTH};
use radio_core::playback::{Controller, PlaybackState};
use radio_core::protocol::{PlayerCommand, PlayerHealth};

use crate::{
    action::Action,
    component::Component,
    components::radio_panel::RadioPanel,
    core::{CoreEvent, PlayerEvent},
};

const INPUT_POLL: Duration = Duration::from_millis(100);

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Player(PlayerEvent),
}

/// Marquee text for a track: the configured label, else the upper-cased file name.
pub fn track_title(track: &Path, label: Option<&str>) -> String {
    if let Some(label) = label {
        return label.to_string();
    }
    track
        .file_name()
        .map(|n| n.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "NO TRACK".to_string())
}

pub struct App {
    config: Config,
    controller: Controller,
    meter: LevelMeter,
    marquee: Marquee,
    radio: RadioPanel,
    core_tx: mpsc::Sender<CoreEvent>,
    /// Origin of the monotonic `now` handed to the controller.
    clock: Instant,
    /// Latest analyser frame; cleared when the tap stops.
    frame: Option<Arc<Vec<f32>>>,
    health: PlayerHealth,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, title: String, core_tx: mpsc::Sender<CoreEvent>) -> Self {
        let state = PlaybackState::new(config.player.default_volume);
        let controller = Controller::new(state)
            .with_ramps(config.player.ramp_secs, config.player.mute_ramp_secs);
        let meter = LevelMeter::new(config.meter.bands, config.meter.decay, config.meter.source);
        Self {
            controller,
            meter,
            marquee: Marquee::new(title, TRACK_WIDTH),
            radio: RadioPanel::new(),
            core_tx,
            clock: Instant::now(),
            frame: None,
            health: PlayerHealth::Absent,
            should_quit: false,
            config,
        }
    }

    fn now(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    pub async fn run(mut self, mut player_rx: mpsc::Receiver<PlayerEvent>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal, &mut player_rx).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        let _ = self.core_tx.send(CoreEvent::Shutdown).await;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        player_rx: &mut mpsc::Receiver<PlayerEvent>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        // Polls so the thread notices the loop is gone and lets the runtime exit.
        tokio::task::spawn_blocking(move || {
            while !event_tx.is_closed() {
                match event::poll(INPUT_POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => break,
                }
                match event::read() {
                    Ok(ev) => {
                        if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        // ── Start-up state for the player ─────────────────────────────────────
        let initial = self.controller.initial_gain();
        self.send_commands(vec![initial]).await;
        self.refresh_mood().await;

        // ── Periodic timers ───────────────────────────────────────────────────
        let frame_ms = (1000 / self.config.display.fps.max(1)) as u64;
        let mut frame_tick = tokio::time::interval(Duration::from_millis(frame_ms));
        frame_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut marquee_tick =
            tokio::time::interval(Duration::from_millis(self.config.display.marquee_step_ms.max(1)));
        marquee_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("app: event loop running");
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    if self.handle_message(msg).await {
                        terminal.draw(|f| self.draw(f))?;
                    }
                }
                Some(evt) = player_rx.recv() => {
                    self.handle_message(AppMessage::Player(evt)).await;
                }
                _ = marquee_tick.tick() => {
                    self.marquee.advance();
                }
                _ = frame_tick.tick() => {
                    self.on_frame().await;
                    terminal.draw(|f| self.draw(f))?;
                }
            }

            if self.should_quit {
                info!("app: quit");
                break;
            }
        }
        Ok(())
    }

    /// Returns true when the panel should be redrawn right away.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        let actions = match msg {
            AppMessage::Event(Event::Key(key)) => self.radio.handle_key(key),
            AppMessage::Event(Event::Mouse(mouse)) => self.radio.handle_mouse(mouse),
            AppMessage::Event(Event::Resize(..)) => return true,
            AppMessage::Event(_) => return false,
            AppMessage::Player(evt) => {
                self.handle_player_event(evt).await;
                return false;
            }
        };
        let acted = !actions.is_empty();
        self.dispatch(actions).await;
        acted && !self.should_quit
    }

    async fn handle_player_event(&mut self, evt: PlayerEvent) {
        match evt {
            PlayerEvent::Health(h) => self.health = h,
            PlayerEvent::TrackEnded => {
                let now = self.now();
                let cmds = self.controller.on_track_end(now);
                self.send_commands(cmds).await;
            }
            PlayerEvent::Frame(frame) => self.frame = Some(frame),
            PlayerEvent::FrameCleared => self.frame = None,
            PlayerEvent::Log(msg) => info!("player: {}", msg),
        }
    }

    async fn dispatch(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Quit => self.should_quit = true,
                Action::Radio(intent) => {
                    let cmds = self.apply_intent(intent);
                    self.send_commands(cmds).await;
                }
            }
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Vec<PlayerCommand> {
        debug!("intent {:?}", intent);
        let now = self.now();
        let step = self.config.player.volume_step as i32;
        let c = &mut self.controller;
        match intent {
            Intent::TogglePlay => c.toggle_play(now),
            Intent::Play => c.play(now),
            Intent::Pause => c.pause(now),
            Intent::Stop => c.stop(),
            Intent::VolumeUp => c.change_volume(step),
            Intent::VolumeDown => c.change_volume(-step),
            Intent::ToggleMute => c.toggle_mute(),
            Intent::ToggleLoop => {
                c.toggle_loop();
                Vec::new()
            }
        }
    }

    async fn send_commands(&self, cmds: Vec<PlayerCommand>) {
        for cmd in cmds {
            if self.core_tx.send(CoreEvent::Command(cmd)).await.is_err() {
                warn!("app: player core gone, command dropped");
            }
        }
    }

    async fn refresh_mood(&mut self) {
        let mood = current_mood(chrono::Local::now(), self.config.mood.fixed_hour);
        let now = self.now();
        let cmds = self.controller.apply_mood(mood, now);
        self.send_commands(cmds).await;
    }

    async fn on_frame(&mut self) {
        let state = self.controller.state();
        // No frame while idle or while the tap restarts reads as silence.
        match self.frame.as_ref() {
            Some(frame) if state.playing && !state.paused => {
                self.meter.update(Some(frame.as_slice()))
            }
            _ => self.meter.update_silent(),
        }
        self.refresh_mood().await;
    }

    fn notice(&self) -> Option<String> {
        match &self.health {
            PlayerHealth::Dead(reason) => Some(format!("NO AUDIO: {}", reason)),
            _ => None,
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let mood = current_mood(chrono::Local::now(), self.config.mood.fixed_hour);
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        let track = self.marquee.window();
        let eq = self.meter.ascii();
        let notice = self.notice();
        let state = self.controller.state();
        let panel = render(&PanelView {
            track: &track,
            status: state.status(),
            time: &time,
            mood: &mood,
            volume: state.volume,
            muted: state.muted,
            looping: state.looping,
            eq: &eq,
            notice: notice.as_deref(),
        });
        self.radio.set_panel(panel);
        let area = frame.area();
        self.radio.draw(frame, area);
    }
}
