//! Playback controller.
//!
//! Holds the play/pause/stop/loop/mute/volume flags and the media offset.
//! Every operation mutates `PlaybackState` and returns the `PlayerCommand`s
//! the external player has to run; the controller itself never talks to the
//! player. Times are monotonic seconds supplied by the caller.

use tracing::debug;

use crate::mood::MoodSetting;
use crate::protocol::{PlaybackStatus, PlayerCommand, SILENT_DB};

pub const VOLUME_MAX: u8 = 100;
/// Volume restored by unmute when nothing was remembered.
pub const FALLBACK_VOLUME: u8 = 50;

pub const DEFAULT_RAMP_SECS: f64 = 0.02;
pub const DEFAULT_MUTE_RAMP_SECS: f64 = 0.05;

/// Linear gain to dB; non-positive gains are silence.
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        return SILENT_DB;
    }
    20.0 * gain.log10()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub playing: bool,
    pub paused: bool,
    pub muted: bool,
    pub looping: bool,
    pub volume: u8,
    pub last_volume: u8,
    /// Media position accumulated up to the last pause.
    pub offset_secs: f64,
    /// Monotonic time of the last start/resume.
    pub started_at: f64,
    /// Rate of the mood in effect; scales wall time into media time.
    pub rate: f64,
}

impl PlaybackState {
    pub fn new(volume: u8) -> Self {
        let volume = volume.min(VOLUME_MAX);
        Self {
            playing: false,
            paused: false,
            muted: false,
            looping: false,
            volume,
            last_volume: volume,
            offset_secs: 0.0,
            started_at: 0.0,
            rate: 1.0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.paused {
            PlaybackStatus::Paused
        } else if self.playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Stopped
        }
    }

    /// Output gain in dB for the current volume/mute flags.
    pub fn effective_gain_db(&self) -> f64 {
        if self.muted || self.volume == 0 {
            SILENT_DB
        } else {
            gain_to_db(self.volume as f64 / 100.0)
        }
    }

    /// Media position at `now`.
    pub fn elapsed(&self, now: f64) -> f64 {
        if self.playing && !self.paused {
            self.offset_secs + (now - self.started_at).max(0.0) * self.rate
        } else {
            self.offset_secs
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(FALLBACK_VOLUME)
    }
}

/// Owns `PlaybackState` and turns user intents into player commands.
#[derive(Debug, Clone)]
pub struct Controller {
    state: PlaybackState,
    volume_ramp_secs: f64,
    mute_ramp_secs: f64,
    mood: Option<MoodSetting>,
}

impl Controller {
    pub fn new(state: PlaybackState) -> Self {
        Self {
            state,
            volume_ramp_secs: DEFAULT_RAMP_SECS,
            mute_ramp_secs: DEFAULT_MUTE_RAMP_SECS,
            mood: None,
        }
    }

    pub fn with_ramps(mut self, volume_ramp_secs: f64, mute_ramp_secs: f64) -> Self {
        self.volume_ramp_secs = volume_ramp_secs.max(0.0);
        self.mute_ramp_secs = mute_ramp_secs.max(0.0);
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Gain command for start-up, applied without a ramp.
    pub fn initial_gain(&self) -> PlayerCommand {
        PlayerCommand::SetGain {
            db: self.state.effective_gain_db(),
            ramp_secs: 0.0,
        }
    }

    /// Re-apply the mood. Only yields a command when the bucket changed.
    pub fn apply_mood(&mut self, mood: MoodSetting, now: f64) -> Vec<PlayerCommand> {
        if self.mood.map(|m| m.mood) == Some(mood.mood) {
            return Vec::new();
        }
        debug!("mood → {}", mood.label);
        let s = &mut self.state;
        if s.playing && !s.paused {
            // Time already played counts at the old rate.
            s.offset_secs = s.elapsed(now);
            s.started_at = now;
        }
        s.rate = mood.rate;
        self.mood = Some(mood);
        vec![PlayerCommand::ApplyMood(mood)]
    }

    pub fn play(&mut self, now: f64) -> Vec<PlayerCommand> {
        let s = &mut self.state;
        if !s.playing && !s.paused {
            s.offset_secs = 0.0;
            s.started_at = now;
            s.playing = true;
            vec![PlayerCommand::Start { offset_secs: 0.0 }]
        } else if s.paused {
            s.started_at = now;
            s.paused = false;
            vec![PlayerCommand::Start {
                offset_secs: s.offset_secs,
            }]
        } else {
            Vec::new()
        }
    }

    /// Pause toggle. A no-op while stopped.
    pub fn pause(&mut self, now: f64) -> Vec<PlayerCommand> {
        let s = &mut self.state;
        if !s.playing {
            return Vec::new();
        }
        if !s.paused {
            s.offset_secs += (now - s.started_at).max(0.0) * s.rate;
            s.paused = true;
            vec![PlayerCommand::Halt]
        } else {
            s.started_at = now;
            s.paused = false;
            vec![PlayerCommand::Start {
                offset_secs: s.offset_secs,
            }]
        }
    }

    /// Space bar: play when not playing, otherwise pause toggle.
    pub fn toggle_play(&mut self, now: f64) -> Vec<PlayerCommand> {
        if !self.state.playing {
            self.play(now)
        } else {
            self.pause(now)
        }
    }

    pub fn stop(&mut self) -> Vec<PlayerCommand> {
        let s = &mut self.state;
        if s.playing || s.paused {
            s.playing = false;
            s.paused = false;
            s.offset_secs = 0.0;
            return vec![PlayerCommand::Halt];
        }
        Vec::new()
    }

    pub fn toggle_loop(&mut self) {
        self.state.looping = !self.state.looping;
    }

    pub fn toggle_mute(&mut self) -> Vec<PlayerCommand> {
        let s = &mut self.state;
        if !s.muted {
            s.last_volume = s.volume;
            s.muted = true;
        } else {
            s.muted = false;
            let restore = if s.last_volume == 0 {
                FALLBACK_VOLUME
            } else {
                s.last_volume
            };
            s.volume = restore.max(1);
        }
        vec![PlayerCommand::SetGain {
            db: s.effective_gain_db(),
            ramp_secs: self.mute_ramp_secs,
        }]
    }

    /// Step the volume. Ignored while muted.
    pub fn change_volume(&mut self, delta: i32) -> Vec<PlayerCommand> {
        let s = &mut self.state;
        if s.muted {
            return Vec::new();
        }
        s.volume = (s.volume as i32 + delta).clamp(0, VOLUME_MAX as i32) as u8;
        vec![PlayerCommand::SetGain {
            db: s.effective_gain_db(),
            ramp_secs: self.volume_ramp_secs,
        }]
    }

    /// The player reached the end of the track on its own.
    pub fn on_track_end(&mut self, now: f64) -> Vec<PlayerCommand> {
        if self.state.paused {
            return Vec::new();
        }
        self.state.playing = false;
        self.state.offset_secs = 0.0;
        if self.state.looping {
            return self.play(now);
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctl() -> Controller {
        Controller::new(PlaybackState::new(50))
    }

    #[test]
    fn play_from_stopped_starts_at_zero() {
        let mut c = ctl();
        assert_eq!(c.play(10.0), vec![PlayerCommand::Start { offset_secs: 0.0 }]);
        assert_eq!(c.state().status(), PlaybackStatus::Playing);
        assert!(c.play(11.0).is_empty());
    }

    #[test]
    fn pause_accumulates_offset_and_resumes() {
        let mut c = ctl();
        c.play(10.0);
        assert_eq!(c.pause(14.0), vec![PlayerCommand::Halt]);
        assert_eq!(c.state().offset_secs, 4.0);
        assert_eq!(c.state().status(), PlaybackStatus::Paused);

        assert_eq!(c.pause(20.0), vec![PlayerCommand::Start { offset_secs: 4.0 }]);
        c.pause(22.5);
        assert_eq!(c.state().offset_secs, 6.5);
    }

    #[test]
    fn pause_while_stopped_is_noop() {
        let mut c = ctl();
        assert!(c.pause(1.0).is_empty());
        assert_eq!(c.state().status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn play_while_paused_resumes() {
        let mut c = ctl();
        c.play(0.0);
        c.pause(3.0);
        assert_eq!(c.play(5.0), vec![PlayerCommand::Start { offset_secs: 3.0 }]);
        assert_eq!(c.state().elapsed(6.0), 4.0);
    }

    #[test]
    fn stop_resets_offset() {
        let mut c = ctl();
        c.play(0.0);
        c.pause(2.0);
        assert_eq!(c.stop(), vec![PlayerCommand::Halt]);
        assert_eq!(c.state().offset_secs, 0.0);
        assert!(c.stop().is_empty());
    }

    #[test]
    fn toggle_play_follows_space_bar() {
        let mut c = ctl();
        assert_eq!(c.toggle_play(0.0), vec![PlayerCommand::Start { offset_secs: 0.0 }]);
        assert_eq!(c.toggle_play(1.0), vec![PlayerCommand::Halt]);
        assert_eq!(c.toggle_play(2.0), vec![PlayerCommand::Start { offset_secs: 1.0 }]);
    }

    #[test]
    fn volume_is_clamped() {
        let mut c = ctl();
        for _ in 0..10 {
            c.change_volume(10);
        }
        assert_eq!(c.state().volume, 100);
        for _ in 0..20 {
            c.change_volume(-10);
        }
        assert_eq!(c.state().volume, 0);
        assert_eq!(c.state().effective_gain_db(), SILENT_DB);
    }

    #[test]
    fn mute_preserves_and_restores_volume() {
        let mut c = ctl();
        c.change_volume(20);
        let cmds = c.toggle_mute();
        assert_eq!(
            cmds,
            vec![PlayerCommand::SetGain {
                db: SILENT_DB,
                ramp_secs: DEFAULT_MUTE_RAMP_SECS
            }]
        );
        assert!(c.change_volume(10).is_empty());
        assert_eq!(c.state().volume, 70);

        c.toggle_mute();
        assert!(!c.state().muted);
        assert_eq!(c.state().volume, 70);
    }

    #[test]
    fn unmute_from_zero_falls_back() {
        let mut c = Controller::new(PlaybackState::new(0));
        c.toggle_mute();
        c.toggle_mute();
        assert_eq!(c.state().volume, FALLBACK_VOLUME);
    }

    #[test]
    fn gain_conversion() {
        assert_eq!(gain_to_db(0.0), SILENT_DB);
        assert_eq!(gain_to_db(1.0), 0.0);
        assert!((gain_to_db(0.5) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn track_end_with_loop_restarts() {
        let mut c = ctl();
        c.toggle_loop();
        c.play(0.0);
        assert_eq!(c.on_track_end(30.0), vec![PlayerCommand::Start { offset_secs: 0.0 }]);
        assert_eq!(c.state().status(), PlaybackStatus::Playing);
    }

    #[test]
    fn track_end_without_loop_stops() {
        let mut c = ctl();
        c.play(0.0);
        assert!(c.on_track_end(30.0).is_empty());
        assert_eq!(c.state().status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn track_end_ignored_while_paused() {
        let mut c = ctl();
        c.play(0.0);
        c.pause(1.0);
        assert!(c.on_track_end(2.0).is_empty());
        assert_eq!(c.state().status(), PlaybackStatus::Paused);
    }

    #[test]
    fn mood_only_applied_on_change() {
        let mut c = ctl();
        let m = crate::mood::mood_for_hour(8);
        assert_eq!(c.apply_mood(m, 0.0).len(), 1);
        assert!(c.apply_mood(m, 0.0).is_empty());
        assert_eq!(c.state().rate, 1.06);
        assert_eq!(c.apply_mood(crate::mood::mood_for_hour(20), 0.0).len(), 1);
    }

    #[test]
    fn mood_change_mid_play_keeps_position() {
        let mut c = ctl();
        c.apply_mood(crate::mood::mood_for_hour(14), 0.0);
        c.play(0.0);
        c.apply_mood(crate::mood::mood_for_hour(2), 10.0);
        assert_eq!(c.state().offset_secs, 10.0);
        assert!((c.state().elapsed(20.0) - 19.4).abs() < 1e-9);
    }
}
